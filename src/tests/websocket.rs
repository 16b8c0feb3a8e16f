//! Websocket routes before the upgrade. Message round trips run over a real
//! listener in `tests/websocket_tests.rs`.

use super::*;
use crate::{Context, Error, RouteMethod};
use axum::http::StatusCode;
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

fn upgrade_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_firewall_rejects_before_upgrade() {
    let config = create_config_with_toml(
        r#"
[[security.firewalls]]
name = "live"
patterns = ["^/live"]

[security.auth]
api_keys = [{ key = "k" }]
"#,
    );
    let mut server = create_test_server(Some(config));
    server.ws("/live", "live", |c: Context| async move { c.send().text("pong") });
    let router = server.into_router().unwrap();

    let response = call(&router, upgrade_request("/live")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(get_body_json(response).await, json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_middleware_output_replaces_upgrade() {
    let handler_called = Arc::new(AtomicBool::new(false));
    let called = handler_called.clone();

    let mut server = create_test_server(None);
    server
        .middleware(|c: Context| async move {
            c.send().status(StatusCode::SERVICE_UNAVAILABLE);
            c.send().error("chat is closed")
        })
        .ws("/chat", "chat", move |c: Context| {
            let called = called.clone();
            async move {
                called.store(true, Ordering::SeqCst);
                c.proceed()
            }
        });
    let router = server.into_router().unwrap();

    let response = call(&router, upgrade_request("/chat")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(get_body_json(response).await, json!({ "error": "chat is closed" }));
    assert!(!handler_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_middleware_error_replaces_upgrade() {
    let mut server = create_test_server(None);
    server
        .middleware(|_c: Context| async move { Err(Error::msg("banned")) })
        .ws("/chat", "chat", |c: Context| async move { c.proceed() });
    let router = server.into_router().unwrap();

    let response = call(&router, upgrade_request("/chat")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(get_body_json(response).await, json!({ "error": "banned" }));
}

#[tokio::test]
async fn test_plain_get_is_rejected() {
    let mut server = create_test_server(None);
    server.ws("/chat", "chat", |c: Context| async move { c.proceed() });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/chat")).await;
    assert!(response.status().is_client_error());

    let response = call(&router, post_request("/chat")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_http_route_can_broadcast_to_hub() {
    let mut server = create_test_server(None);
    server
        .ws("/chat", "chat", |c: Context| async move { c.proceed() })
        .post("/announce", |c: Context| async move {
            let writer = c.send().ws("chat")?;
            let delivered = writer.broadcast_text("server restarting");
            c.send().json(&json!({
                "delivered": delivered,
                "current": writer.current().is_some(),
            }))
        });

    assert_eq!(server.routes()[0].method(), RouteMethod::Ws);
    let router = server.into_router().unwrap();

    let response = call(&router, post_request("/announce")).await;
    assert_eq!(
        get_body_json(response).await,
        json!({ "result": { "delivered": 0, "current": false } })
    );
}
