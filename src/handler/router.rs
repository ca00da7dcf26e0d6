//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the `/`
//! special case, and access logging.

use crate::config::AppState;
use crate::handler::static_files::{self, INDEX_FILE};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, REFERER, SERVER, USER_AGENT};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let path = req.uri().path();

    let mut response = route_request(method, path, &state).await;

    if let Ok(value) = HeaderValue::from_str(&state.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if state.access_log() {
        let mut entry = AccessLogEntry::new(
            peer_addr.map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
            method.to_string(),
            path.to_string(),
        );
        entry.query = req.uri().query().map(ToString::to_string);
        entry.http_version = version_label(req.version()).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.referer = header_string(&req, &REFERER);
        entry.user_agent = header_string(&req, &USER_AGENT);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request by method and path
async fn route_request(method: &Method, path: &str, state: &AppState) -> Response<Full<Bytes>> {
    match *method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return http::build_options_response(),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method} {path}"));
            return http::build_405_response();
        }
    }

    let is_head = *method == Method::HEAD;
    if path == "/" {
        static_files::serve_path(&state.root, INDEX_FILE, is_head).await
    } else {
        static_files::serve_path(&state.root, path, is_head).await
    }
}

fn header_string<B>(req: &Request<B>, name: &hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LoggingConfig, PerformanceConfig, ServerConfig};
    use http_body_util::BodyExt;
    use hyper::header::{ALLOW, CONTENT_TYPE};
    use hyper::StatusCode;
    use std::fs;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                root: ".".to_string(),
                workers: None,
            },
            logging: LoggingConfig {
                access_log: false,
                access_log_format: "combined".to_string(),
                access_log_file: None,
                error_log_file: None,
            },
            performance: PerformanceConfig {
                keep_alive: true,
                request_timeout: 5,
                max_connections: None,
            },
        }
    }

    fn test_state(with_index: bool) -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("www");
        fs::create_dir_all(root.join("image")).unwrap();
        if with_index {
            fs::write(root.join("index.html"), "<h1>Hi</h1>").unwrap();
        }
        fs::write(root.join("style.css"), "h1 { color: red; }").unwrap();
        fs::write(root.join("image/icon.png"), [0x89, b'P', b'N', b'G', 0x00, 0xff]).unwrap();
        fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
        let root = root.canonicalize().unwrap();
        (dir, Arc::new(AppState::new(&test_config(), root)))
    }

    async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
    ) -> (StatusCode, hyper::HeaderMap, Bytes) {
        let req = Request::builder().method(method).uri(uri).body(()).unwrap();
        let resp = handle_request(req, Arc::clone(state), None).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let (_dir, state) = test_state(true);

        let (status, headers, body) = send(&state, Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body, Bytes::from_static(b"<h1>Hi</h1>"));

        let (status2, headers2, body2) = send(&state, Method::GET, "/index.html").await;
        assert_eq!(status2, status);
        assert_eq!(headers2[CONTENT_TYPE], headers[CONTENT_TYPE]);
        assert_eq!(body2, body);
    }

    #[tokio::test]
    async fn test_root_ignores_query() {
        let (_dir, state) = test_state(true);
        let (status, _, body) = send(&state, Method::GET, "/?utm=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(b"<h1>Hi</h1>"));
    }

    #[tokio::test]
    async fn test_root_without_index_is_404() {
        let (_dir, state) = test_state(false);
        let (status, _, _) = send(&state, Method::GET, "/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_files_by_extension() {
        let (_dir, state) = test_state(true);

        let (status, headers, body) = send(&state, Method::GET, "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[CONTENT_TYPE].to_str().unwrap().starts_with("text/css"));
        assert_eq!(body, Bytes::from_static(b"h1 { color: red; }"));

        let (status, headers, body) = send(&state, Method::GET, "/image/icon.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(body.as_ref(), &[0x89, b'P', b'N', b'G', 0x00, 0xff]);
    }

    #[tokio::test]
    async fn test_missing_and_traversal_are_404() {
        let (_dir, state) = test_state(true);

        let (status, _, _) = send(&state, Method::GET, "/missing.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(&state, Method::GET, "/style.css/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.starts_with(b"404"));

        for uri in ["/../secret.txt", "/%2e%2e/secret.txt", "/image/../../secret.txt"] {
            let (status, _, body) = send(&state, Method::GET, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_ne!(body, Bytes::from_static(b"top secret"));
        }
    }

    #[tokio::test]
    async fn test_head_has_headers_without_body() {
        let (_dir, state) = test_state(true);
        let (status, headers, body) = send(&state, Method::HEAD, "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[hyper::header::CONTENT_LENGTH], "18");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_other_methods() {
        let (_dir, state) = test_state(true);

        let (status, headers, _) = send(&state, Method::POST, "/").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers[ALLOW], http::ALLOWED_METHODS);

        let (status, _, _) = send(&state, Method::DELETE, "/style.css").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, headers, _) = send(&state, Method::OPTIONS, "/").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(headers[ALLOW], http::ALLOWED_METHODS);
    }

    #[tokio::test]
    async fn test_server_header() {
        let (_dir, state) = test_state(true);
        let (_, headers, _) = send(&state, Method::GET, "/missing").await;
        assert_eq!(headers[SERVER], state.server_name.as_str());
    }
}
