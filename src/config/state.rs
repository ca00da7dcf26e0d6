// Application state module
// Immutable state shared by every connection task

use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::types::Config;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Canonical served root
    pub root: PathBuf,
    /// Value of the `Server` response header
    pub server_name: String,
    pub active_connections: Arc<AtomicUsize>,
}

impl AppState {
    /// Create `AppState` for an already validated, canonical served root
    pub fn new(config: &Config, root: PathBuf) -> Self {
        Self {
            config: config.clone(),
            root,
            server_name: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
