//! # axum-dispatch
//!
//! A request-dispatch core for axum services. Routes are registered with a
//! plain `async fn(Context) -> Result<()>` handler; the dispatcher runs the
//! route middleware in order, runs the handler when no middleware answered,
//! and turns whatever the handler sent into the HTTP response.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum_dispatch::{Config, Context, Result, Server};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn show_user(c: Context) -> Result<()> {
//!     let Some(id) = c.request().param("id").and_then(|id| id.parse().ok()) else {
//!         return c.send().error("invalid user id");
//!     };
//!     c.send().json(&User { id, name: "ada".into() })
//! }
//!
//! async fn rate_limit(c: Context) -> Result<()> {
//!     if c.request().header("x-flood").is_some() {
//!         return c.send().error("too many requests");
//!     }
//!     c.proceed()
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_rust_env()?;  // config/{RUST_ENV}.toml
//!     config.setup_tracing();
//!
//!     let mut server = Server::new(config)?;
//!     let mut api = server.group("/api");
//!     api.middleware(rate_limit).get("/users/{id}", show_user);
//!     server.run().await
//! }
//! ```
//!
//! # Responses
//!
//! | Call | Status | Body |
//! |------|--------|------|
//! | `send().json(v)` | 200 | `{"result": v}` |
//! | `send().text(s)` | 200 | `{"result": "s"}` |
//! | `send().bool(b)` | 200 | `{"result": b}` |
//! | `send().xml(v)` | 200 | XML of `v` |
//! | `send().error(e)` | 400 | `{"error": "e"}` |
//! | `send().redirect(url)` | 302 | empty, `Location: url` |
//! | `send().file(name, bytes)` | 200 | bytes, as an attachment |
//! | handler returns `Err(e)` | kind default | `{"error": "e"}` |
//! | handler panics | 500 | `{"error": "<panic message>"}` |
//!
//! A status set with `send().status(..)` replaces the default. An error
//! returned by the pipeline always wins over anything sent before it.
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | TOML configuration ([`Config`]) |
//! | `routing` | [`Router`], groups, firewalls and path helpers |
//! | `context` | the per-request [`Context`] with [`Parser`], [`Sender`] and [`Cookie`] |
//! | `intercept` | [`Interceptor`] and [`Hook`] |
//! | `dispatch` | [`Handler`], panic recovery, websocket hubs |
//! | `services` | collaborators: auth, cache, files, mail, translation |
//! | `server` | [`Server`] with the tower-http layer stack and graceful shutdown |
//! | `error` | [`Error`] and [`ErrorKind`] |
mod config;
mod context;
mod dispatch;
mod error;
mod intercept;
mod routing;
mod server;
mod services;
mod shutdown;
mod utils;

#[cfg(test)]
mod tests;

pub use config::*;
pub use context::{Context, Cookie, LangContext, MAIN, Multipart, Parser, RequestContext, Sender};
pub use dispatch::{ConnectionId, Handler, WsHub, WsWriter};
pub use error::*;
pub use intercept::{Hook, Interceptor};
pub use routing::{
    Firewall, Route, RouteMethod, RoutePattern, Router, compile_firewalls,
    find_firewalls_with_path, format_path, is_wildcard, join_path,
};
pub use server::Server;
pub use services::{
    AuthManager, AuthMethod, AuthProvider, BasicAuth, CacheStore, FileStore, Identity,
    LocalFileStore, Mail, Mailer, MemoryCache, Passthrough, Translator,
};
pub use shutdown::{ShutdownNotifier, ShutdownPhase};
pub use utils::*;

pub type Result<T, E = Error> = std::result::Result<T, E>;
