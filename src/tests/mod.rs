//! Test helpers for the in-process dispatch tests.
//!
//! These tests build a [`Server`], turn it into an `axum::Router` with
//! `into_router()` and drive it with `oneshot()`, without network I/O.
//! Tests that need a real listener (websocket round trips, graceful
//! shutdown) live under `tests/`.
//!
//! ## Available Helpers
//!
//! - Configuration: `create_base_config()`, `create_config_with_toml()`
//! - Servers: `create_test_server()`, `call()`
//! - Requests: `get_request()`, `post_request()`, `request_with_body()`
//! - Responses: `get_body_string()`, `get_body_json()`

use crate::{Config, Server};
use axum::{body::Body, http::Request, response::Response};
use tower::ServiceExt;

pub(crate) mod context;
pub(crate) mod parser;
pub(crate) mod websocket;

// ============================================================================
// Configuration Helpers
// ============================================================================

/// Base TOML configuration used by most tests.
const BASE_CONFIG_TOML: &str = r#"
[app]
name = "dispatch-test"

[http]
bind_addr = "127.0.0.1"
bind_port = 0
max_payload_size_bytes = "64KiB"
trim_trailing_slash = true

[parser]
limit = 1

[logging]
format = "json"
"#;

pub(crate) fn create_base_config() -> Config {
    BASE_CONFIG_TOML
        .parse()
        .expect("Failed to parse test config TOML")
}

/// Creates a test configuration with additional TOML sections appended.
///
/// ```ignore
/// let config = create_config_with_toml(r#"
/// [[security.firewalls]]
/// name = "admin"
/// patterns = ["^/admin"]
/// "#);
/// ```
pub(crate) fn create_config_with_toml(additional_toml: &str) -> Config {
    format!("{BASE_CONFIG_TOML}\n{additional_toml}")
        .parse()
        .expect("Failed to parse test config TOML")
}

// ============================================================================
// Server Helpers
// ============================================================================

pub(crate) fn create_test_server(config: Option<Config>) -> Server {
    Server::new(config.unwrap_or_else(create_base_config)).expect("Failed to create Server")
}

/// Sends one request through a built router.
pub(crate) async fn call(router: &axum::Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

// ============================================================================
// Request Helpers
// ============================================================================

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub(crate) fn post_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub(crate) fn request_with_body(
    method: &str,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}

// ============================================================================
// Response Helpers
// ============================================================================

pub(crate) async fn get_body_string(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).to_string()
}

pub(crate) async fn get_body_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("response body is not JSON")
}
