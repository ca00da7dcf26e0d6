//! Startup precondition checks
//!
//! Everything that can make the process unusable is checked before the
//! first connection is accepted. Each failure carries a remediation hint
//! that `main` prints before exiting with a non-zero status.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::handler::static_files::INDEX_FILE;
use crate::logger;

/// Fatal startup failure
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid listen address: {0}")]
    Address(String),

    #[error("served root '{}' does not exist", .0.display())]
    RootMissing(PathBuf),

    #[error("served root '{}' is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("served root '{}' is not readable: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open log files: {0}")]
    Logging(std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

impl StartupError {
    /// Human-readable remediation step for the operator
    pub fn remediation(&self) -> String {
        match self {
            Self::Config(_) => {
                "Check the configuration file syntax and the ROOTSERVE_* environment variables."
                    .to_string()
            }
            Self::Address(_) => {
                "Set server.host to an IP address such as 0.0.0.0 or 127.0.0.1.".to_string()
            }
            Self::RootMissing(_) | Self::RootNotDirectory(_) => {
                "Point server.root (or ROOTSERVE_SERVER__ROOT) at an existing directory."
                    .to_string()
            }
            Self::RootUnreadable { .. } => {
                "Grant the server user read and execute permission on the served root.".to_string()
            }
            Self::Logging(_) => {
                "Check that the log file directories are writable, or unset the log file paths."
                    .to_string()
            }
            Self::Bind { addr, source } => {
                if source.kind() == std::io::ErrorKind::PermissionDenied && addr.port() < 1024 {
                    format!(
                        "Port {} is privileged: run with elevated rights (or CAP_NET_BIND_SERVICE), \
                         or choose another port with ROOTSERVE_SERVER__PORT=8080.",
                        addr.port()
                    )
                } else if source.kind() == std::io::ErrorKind::AddrInUse {
                    format!(
                        "Another process is listening on {addr}: stop it or choose another port."
                    )
                } else {
                    "Check server.host and server.port.".to_string()
                }
            }
            Self::Runtime(_) => "Check server.workers and the process thread limits.".to_string(),
        }
    }
}

/// Validate the served root and return its canonical path.
///
/// A missing `index.html` only produces a warning: `GET /` then answers 404.
pub fn check_served_root(root: &Path) -> Result<PathBuf, StartupError> {
    let metadata = match std::fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StartupError::RootMissing(root.to_path_buf()));
        }
        Err(source) => {
            return Err(StartupError::RootUnreadable {
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(StartupError::RootNotDirectory(root.to_path_buf()));
    }

    let unreadable = |source| StartupError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };
    std::fs::read_dir(root).map_err(unreadable)?;
    let canonical = root.canonicalize().map_err(unreadable)?;

    if !canonical.join(INDEX_FILE).is_file() {
        logger::log_warning(&format!(
            "{INDEX_FILE} not found in {}; requests for / will return 404",
            canonical.display()
        ));
    }

    Ok(canonical)
}
