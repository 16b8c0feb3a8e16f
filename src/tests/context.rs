//! Collaborators reached through `Context`.

use super::*;
use crate::{
    Context, LocalFileStore, MAIN, Mail, Mailer, MemoryCache, Result, Translator,
};
use async_trait::async_trait;
use axum::http::{StatusCode, header::SET_COOKIE};
use serde_json::json;
use std::sync::{Arc, Mutex};

const LOCALIZATION_TOML: &str = r#"
[localization]
enabled = true
languages = [{ code = "en", main = true }, { code = "cs" }]
"#;

#[derive(Debug)]
struct Pool {
    url: String,
}

struct Dictionary;

impl Translator for Dictionary {
    fn translate(&self, lang: &str, key: &str, args: &[(&str, &str)]) -> String {
        let template = match (lang, key) {
            ("cs", "greeting") => "Ahoj {name}",
            (_, "greeting") => "Hello {name}",
            _ => return key.to_string(),
        };
        args.iter()
            .fold(template.to_string(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }
}

#[derive(Clone, Default)]
struct Outbox {
    sent: Arc<Mutex<Vec<Mail>>>,
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, mail: Mail) -> Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

fn with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("cookie", cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_language_from_cookie() {
    let mut server = create_test_server(Some(create_config_with_toml(LOCALIZATION_TOML)));
    server.get("/lang", |c: Context| async move { c.send().text(c.lang().current()) });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/lang")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "en" }));

    let response = call(&router, with_cookie("/lang", "lang=cs")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "cs" }));

    let response = call(&router, with_cookie("/lang", "lang=de")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "en" }));
}

#[tokio::test]
async fn test_switching_language() {
    let mut server = create_test_server(Some(create_config_with_toml(LOCALIZATION_TOML)));
    server.post("/lang/{code}", |c: Context| async move {
        let code = c.request().param("code").unwrap_or_default().to_string();
        c.lang().set(&code)?;
        c.send().text(c.lang().current())
    });
    let router = server.into_router().unwrap();

    let response = call(&router, post_request("/lang/cs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[SET_COOKIE],
        "lang=cs; Path=/; HttpOnly; SameSite=Lax; Max-Age=31536000"
    );
    assert_eq!(get_body_json(response).await, json!({ "result": "cs" }));

    let response = call(&router, post_request("/lang/de")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "invalid lang: de" })
    );
}

#[tokio::test]
async fn test_translate_uses_current_language() {
    let mut server = create_test_server(Some(create_config_with_toml(LOCALIZATION_TOML)))
        .with_translator(Dictionary);
    server.get("/hello", |c: Context| async move {
        c.send().text(c.translate("greeting", &[("name", "Eva")]))
    });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/hello")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "Hello Eva" }));

    let response = call(&router, with_cookie("/hello", "lang=cs")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "Ahoj Eva" }));
}

#[tokio::test]
async fn test_registered_database() {
    let mut server = create_test_server(None).with_database(
        MAIN,
        Pool {
            url: "postgres://localhost/app".into(),
        },
    );
    server
        .get("/db", |c: Context| async move {
            let pool = c.db::<Pool>(MAIN)?;
            c.send().text(pool.url.clone())
        })
        .get("/db/wrong-type", |c: Context| async move {
            let count = c.db::<u32>(MAIN)?;
            c.send().json(&*count)
        })
        .get("/db/reports", |c: Context| async move {
            let pool = c.db::<Pool>("reports")?;
            c.send().text(pool.url.clone())
        })
        .get("/auth/reports", |c: Context| async move {
            let auth = c.auth("reports")?;
            c.send().text(auth.database())
        });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/db")).await;
    assert_eq!(
        get_body_json(response).await,
        json!({ "result": "postgres://localhost/app" })
    );

    for uri in ["/db/wrong-type", "/auth/reports"] {
        let response = call(&router, get_request(uri)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
    }

    let response = call(&router, get_request("/db/reports")).await;
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "invalid database: reports" })
    );
}

#[tokio::test]
async fn test_auth_without_provider_is_anonymous() {
    let mut server = create_test_server(None);
    server.get("/me", |c: Context| async move {
        let auth = c.auth(MAIN)?;
        c.send().bool(auth.is_authenticated().await?)
    });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/me")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": false }));
}

#[tokio::test]
async fn test_cache_is_shared_between_requests() {
    let mut server = create_test_server(None).with_cache(MemoryCache::new(16));
    server
        .put("/cache/{key}", |c: Context| async move {
            let key = c.request().param("key").unwrap_or_default().to_string();
            let value = c.parse().bytes().await?;
            c.cache().set(&key, value, None).await?;
            c.proceed()
        })
        .get("/cache/{key}", |c: Context| async move {
            let key = c.request().param("key").unwrap_or_default();
            match c.cache().get(key).await? {
                Some(value) => c.send().text(String::from_utf8_lossy(&value)),
                None => c.send().error("not cached"),
            }
        });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/cache/motd")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = request_with_body("PUT", "/cache/motd", "text/plain", "be kind");
    assert_eq!(call(&router, request).await.status(), StatusCode::OK);

    let response = call(&router, get_request("/cache/motd")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "be kind" }));
}

#[tokio::test]
async fn test_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut server =
        create_test_server(None).with_file_store(LocalFileStore::new(dir.path()));
    server
        .post("/notes/{name}", |c: Context| async move {
            let name = c.request().param("name").unwrap_or_default().to_string();
            let data = c.parse().bytes().await?;
            c.files()?.write(&format!("notes/{name}"), data).await?;
            c.proceed()
        })
        .get("/notes/{name}", |c: Context| async move {
            let name = c.request().param("name").unwrap_or_default();
            let data = c.files()?.read(&format!("notes/{name}")).await?;
            c.send().file(name, data)
        });
    let router = server.into_router().unwrap();

    let request = request_with_body("POST", "/notes/todo.txt", "text/plain", "buy milk");
    assert_eq!(call(&router, request).await.status(), StatusCode::OK);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes").join("todo.txt")).unwrap(),
        "buy milk"
    );

    let response = call(&router, get_request("/notes/todo.txt")).await;
    assert_eq!(get_body_string(response).await, "buy milk");
}

#[tokio::test]
async fn test_missing_collaborators_are_configuration_errors() {
    let mut server = create_test_server(None);
    server
        .get("/file", |c: Context| async move {
            c.files()?.exists("a.txt").await?;
            c.proceed()
        })
        .post("/mail", |c: Context| async move {
            c.email()?.send(Mail::new("a@example.com", "b@example.com", "hi")).await?;
            c.proceed()
        });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/file")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "no file store configured" })
    );

    let response = call(&router, post_request("/mail")).await;
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "no mailer configured" })
    );
}

#[tokio::test]
async fn test_mailer() {
    let outbox = Outbox::default();
    let mut server = create_test_server(None).with_mailer(outbox.clone());
    server.post("/invite", |c: Context| async move {
        let mail = Mail::new("noreply@example.com", "ada@example.com", "Invitation")
            .with_recipient("grace@example.com")
            .with_html("<p>Join us</p>");
        c.email()?.send(mail).await?;
        c.send().bool(true)
    });
    let router = server.into_router().unwrap();

    let response = call(&router, post_request("/invite")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": true }));

    let sent = outbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["ada@example.com", "grace@example.com"]);
    assert!(sent[0].html);
}

#[tokio::test]
async fn test_request_id_is_visible_to_handler() {
    let mut server = create_test_server(None);
    server.get("/id", |c: Context| async move {
        c.send().text(c.request().request_id().unwrap_or_default())
    });
    let router = server.into_router().unwrap();

    let request = Request::builder()
        .uri("/id")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = call(&router, request).await;
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(get_body_json(response).await, json!({ "result": "req-123" }));

    let response = call(&router, get_request("/id")).await;
    let generated = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(!generated.is_empty());
    assert_eq!(get_body_json(response).await, json!({ "result": generated }));
}

#[tokio::test]
async fn test_config_is_reachable() {
    let mut server = create_test_server(None);
    server.get("/name", |c: Context| async move {
        c.send().text(c.config().app.name.clone())
    });
    let router = server.into_router().unwrap();

    let response = call(&router, get_request("/name")).await;
    assert_eq!(get_body_json(response).await, json!({ "result": "dispatch-test" }));
}
