//! Static file serving module
//!
//! Maps request paths onto the served root, loads the file and builds the
//! response. Anything that cannot be resolved to a regular file inside the
//! root answers 404.

use crate::http::{self, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// File served for `/`
pub const INDEX_FILE: &str = "index.html";

/// Why a request path did not produce a file
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no such file")]
    NotFound,
    #[error("path escapes the served root: {0}")]
    Traversal(String),
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A file located inside the served root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical location on disk
    pub path: PathBuf,
    /// Content type inferred from the requested name
    pub content_type: &'static str,
}

/// Serve the file named by `request_path` from `root`
pub async fn serve_path(root: &Path, request_path: &str, is_head: bool) -> Response<Full<Bytes>> {
    match load_file(root, request_path).await {
        Ok((content, content_type)) => http::build_file_response(content, content_type, is_head),
        Err(ResolveError::NotFound) => http::build_404_response(is_head),
        Err(e @ ResolveError::Traversal(_)) => {
            logger::log_warning(&format!("Request blocked: {e}"));
            http::build_404_response(is_head)
        }
        Err(e @ ResolveError::Read { .. }) => {
            logger::log_error(&e.to_string());
            http::build_404_response(is_head)
        }
    }
}

/// Resolve and read a file, returning its bytes and content type
pub async fn load_file(
    root: &Path,
    request_path: &str,
) -> Result<(Bytes, &'static str), ResolveError> {
    let file = resolve(root, request_path).await?;
    let content = fs::read(&file.path)
        .await
        .map_err(|source| ResolveError::Read {
            path: file.path.clone(),
            source,
        })?;
    Ok((Bytes::from(content), file.content_type))
}

/// Resolve a request path against a canonical served root
///
/// The lexical check rejects `..` and other escaping segments before the
/// filesystem is touched; the canonical check then catches symlinks that
/// point outside the root.
pub async fn resolve(root: &Path, request_path: &str) -> Result<ResolvedFile, ResolveError> {
    let relative = sanitize_path(request_path)?;
    if relative.as_os_str().is_empty() {
        return Err(ResolveError::NotFound);
    }

    // Missing files are the common case, not worth a log line
    let canonical = fs::canonicalize(root.join(&relative))
        .await
        .map_err(|_| ResolveError::NotFound)?;
    if !canonical.starts_with(root) {
        return Err(ResolveError::Traversal(format!(
            "{request_path} -> {}",
            canonical.display()
        )));
    }

    let metadata = fs::metadata(&canonical)
        .await
        .map_err(|_| ResolveError::NotFound)?;
    if !metadata.is_file() {
        return Err(ResolveError::NotFound);
    }

    Ok(ResolvedFile {
        path: canonical,
        content_type: mime::content_type_for_path(&relative),
    })
}

/// Turn a URL path into a relative filesystem path
///
/// Empty and `.` segments are dropped. `..`, backslashes, NUL bytes and
/// anything the platform treats as a root or prefix are rejected. A
/// trailing `/` names a directory, so it never resolves to a file.
pub fn sanitize_path(request_path: &str) -> Result<PathBuf, ResolveError> {
    let decoded = percent_decode(request_path).ok_or(ResolveError::NotFound)?;
    let mut relative = PathBuf::new();

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ResolveError::Traversal(request_path.to_string())),
            s if s.contains('\\') || s.contains('\0') => {
                return Err(ResolveError::Traversal(request_path.to_string()));
            }
            s => {
                let mut components = Path::new(s).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(part)), None) => relative.push(part),
                    _ => return Err(ResolveError::Traversal(request_path.to_string())),
                }
            }
        }
    }

    if decoded.ends_with('/') && !relative.as_os_str().is_empty() {
        return Err(ResolveError::NotFound);
    }

    Ok(relative)
}

/// Decode `%XX` escapes; malformed escapes are kept literally.
/// Returns `None` when the decoded bytes are not UTF-8.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).ok()
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
