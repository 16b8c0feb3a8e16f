//! Body extraction through `Parser`.

use super::*;
use crate::{Context, Result};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

const BOUNDARY: &str = "X-UPLOAD-BOUNDARY";

#[derive(Debug, Deserialize, Serialize)]
struct Order {
    id: u32,
    items: Vec<String>,
}

fn multipart(parts: &[(&str, Option<&str>, &str)]) -> String {
    let mut body = String::new();
    for (field, file_name, content) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file_name {
            Some(file_name) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{field}\"\r\n\r\n"
            )),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn multipart_request(uri: &str, body: String) -> Request<Body> {
    request_with_body(
        "POST",
        uri,
        &format!("multipart/form-data; boundary={BOUNDARY}"),
        body,
    )
}

#[tokio::test]
async fn test_json_body() {
    let mut server = create_test_server(None);
    server.post("/orders", |c: Context| async move {
        let order: Order = c.parse().json().await?;
        c.send().json(&order)
    });
    let router = server.into_router().unwrap();

    let request = request_with_body(
        "POST",
        "/orders",
        "application/json",
        r#"{"id": 7, "items": ["tea", "milk"]}"#,
    );
    let response = call(&router, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({ "result": { "id": 7, "items": ["tea", "milk"] } })
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let mut server = create_test_server(None);
    server.post("/orders", |c: Context| async move {
        let order: Order = c.parse().json().await?;
        c.send().json(&order)
    });
    let router = server.into_router().unwrap();

    let request = request_with_body("POST", "/orders", "application/json", "{\"id\": ");
    let response = call(&router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = get_body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_text_and_xml_bodies() {
    #[derive(Deserialize)]
    struct Note {
        title: String,
    }

    let mut server = create_test_server(None);
    server
        .put("/echo", |c: Context| async move {
            let text = c.parse().text().await?;
            c.send().text(text.trim().to_string())
        })
        .put("/note", |c: Context| async move {
            let note: Note = c.parse().xml().await?;
            c.send().text(note.title)
        });
    let router = server.into_router().unwrap();

    let request = request_with_body("PUT", "/echo", "text/plain", "  hello there \n");
    let response = call(&router, request).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "hello there" }));

    let request = request_with_body(
        "PUT",
        "/note",
        "application/xml",
        "<Note><title>groceries</title></Note>",
    );
    let response = call(&router, request).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "groceries" }));
}

#[tokio::test]
async fn test_body_can_be_consumed_once() {
    async fn peek_then_parse(c: Context) -> Result<()> {
        let _ = c.parse().bytes().await?;
        c.proceed()
    }

    let mut server = create_test_server(None);
    server
        .middleware(peek_then_parse)
        .post("/twice", |c: Context| async move {
            let text = c.parse().text().await?;
            c.send().text(text)
        });
    let router = server.into_router().unwrap();

    let response = call(&router, request_with_body("POST", "/twice", "text/plain", "x")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "body already consumed" })
    );
}

#[tokio::test]
async fn test_multipart_upload() {
    let mut server = create_test_server(None);
    server.post("/upload", |c: Context| async move {
        let avatar = c.parse().file("avatar").await?;
        c.send().json(&json!({
            "key": avatar.key,
            "name": avatar.name,
            "suffix": avatar.suffix,
            "content_type": avatar.content_type,
            "size": avatar.data.len(),
        }))
    });
    let router = server.into_router().unwrap();

    let body = multipart(&[
        ("title", None, "holiday"),
        ("avatar", Some("me.profile.txt"), "plain text avatar"),
    ]);
    let response = call(&router, multipart_request("/upload", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({ "result": {
            "key": "avatar",
            "name": "me.profile.txt",
            "suffix": "txt",
            "content_type": "text/plain; charset=utf-8",
            "size": 17,
        }})
    );
}

#[tokio::test]
async fn test_multipart_files_by_name() {
    let mut server = create_test_server(None);
    server.post("/gallery", |c: Context| async move {
        let files = c.parse().files(&["front", "back"]).await?;
        let names: Vec<String> = files.into_iter().map(|file| file.name).collect();
        c.send().json(&names)
    });
    let router = server.into_router().unwrap();

    let body = multipart(&[
        ("front", Some("front.txt"), "a"),
        ("ignored", Some("other.txt"), "b"),
        ("back", Some("back.txt"), "c"),
    ]);
    let response = call(&router, multipart_request("/gallery", body)).await;

    assert_eq!(
        get_body_json(response).await,
        json!({ "result": ["front.txt", "back.txt"] })
    );
}

#[tokio::test]
async fn test_missing_file_is_empty() {
    let mut server = create_test_server(None);
    server.post("/upload", |c: Context| async move {
        let file = c.parse().file("avatar").await?;
        c.send().bool(file.data.is_empty() && file.name.is_empty())
    });
    let router = server.into_router().unwrap();

    let body = multipart(&[("title", None, "no files here")]);
    let response = call(&router, multipart_request("/upload", body)).await;

    assert_eq!(get_body_json(response).await, json!({ "result": true }));
}

#[tokio::test]
async fn test_file_requires_multipart_content_type() {
    let mut server = create_test_server(None);
    server.post("/upload", |c: Context| async move {
        let file = c.parse().file("avatar").await?;
        c.send().text(file.name)
    });
    let router = server.into_router().unwrap();

    let request = request_with_body("POST", "/upload", "application/json", "{}");
    let response = call(&router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "request has not multipart content type" })
    );
}

#[tokio::test]
async fn test_multipart_without_boundary_is_invalid() {
    let mut server = create_test_server(None);
    server.post("/upload", |c: Context| async move {
        let file = c.parse().file("avatar").await?;
        c.send().text(file.name)
    });
    let router = server.into_router().unwrap();

    let body = multipart(&[("avatar", Some("me.png"), "png")]);
    let request = request_with_body("POST", "/upload", "multipart/form-data", body);
    let response = call(&router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "request has not multipart content type" })
    );
}
