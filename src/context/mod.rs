//!
//! The per-request facade handed to middleware and handlers.
//!
//! A [`Context`] is created once per request (and once per websocket
//! message) and groups everything a handler needs: the request view, the
//! body [`Parser`], the response [`Sender`], the [`Cookie`] jar and the
//! collaborators registered on the server.
//!
//! ```
//! use axum_dispatch::{Context, MAIN, Result};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Login {
//!     username: String,
//! }
//!
//! async fn login(c: Context) -> Result<()> {
//!     let login: Login = c.parse().json().await?;
//!     if c.auth(MAIN)?.is_authenticated().await? {
//!         return c.send().text(format!("welcome back {}", login.username));
//!     }
//!     c.send().error("unknown user")
//! }
//! ```
//!
mod cookie;
mod lang;
mod parser;
mod request;
mod sender;

pub use cookie::Cookie;
pub use lang::LangContext;
pub use parser::{Multipart, Parser};
pub use request::RequestContext;
pub use sender::Sender;

pub(crate) use sender::{CONTENT_TYPE_JSON, DataKind, SendState};

use {
    crate::{
        AuthManager, CacheStore, Config, Error, FileStore, Interceptor, Mailer, Result,
        dispatch::{ConnectionId, WsHubs},
        services::Services,
    },
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

/// Name of the default database.
pub const MAIN: &str = "main";

/// Server-wide state shared by every request.
pub(crate) struct Shared {
    pub config: Arc<Config>,
    pub services: Services,
    pub hubs: WsHubs,
    pub shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    shared: Arc<Shared>,
    request: RequestContext,
    parser: Parser,
    sender: Sender,
    cookie: Cookie,
}

impl Context {
    pub(crate) fn new(
        shared: Arc<Shared>,
        interceptor: Arc<Interceptor>,
        request: RequestContext,
        parser: Parser,
        connection: Option<ConnectionId>,
    ) -> Self {
        let cookie = Cookie::new(request.headers(), shared.config.router.cookie_path());
        let sender = Sender::new(request.clone(), interceptor, shared.hubs.clone(), connection);
        Self {
            inner: Arc::new(ContextInner {
                shared,
                request,
                parser,
                sender,
                cookie,
            }),
        }
    }

    fn services(&self) -> &Services {
        &self.inner.shared.services
    }

    ///
    /// The authentication manager for `database` (usually [`MAIN`]).
    ///
    /// Fails with a configuration error when databases are registered and
    /// none of them is named `database`.
    ///
    pub fn auth(&self, database: &str) -> Result<AuthManager> {
        let services = self.services();
        if !services.databases.is_empty() && !services.databases.contains_key(database) {
            return Err(Error::invalid_database(database));
        }
        Ok(AuthManager::new(
            services.auth.clone(),
            self.inner.request.clone(),
            database,
        ))
    }

    pub fn cache(&self) -> Arc<dyn CacheStore> {
        self.services().cache.clone()
    }

    pub fn files(&self) -> Result<Arc<dyn FileStore>> {
        self.services()
            .files
            .clone()
            .ok_or_else(|| Error::config("no file store configured"))
    }

    pub fn email(&self) -> Result<Arc<dyn Mailer>> {
        self.services()
            .mailer
            .clone()
            .ok_or_else(|| Error::config("no mailer configured"))
    }

    /// The database registered under `name`, downcast to `T`.
    pub fn db<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.services()
            .databases
            .get(name)
            .cloned()
            .and_then(|db| db.downcast::<T>().ok())
            .ok_or_else(|| Error::invalid_database(name))
    }

    pub fn lang(&self) -> LangContext<'_> {
        LangContext::new(&self.inner.shared.config.localization, &self.inner.cookie)
    }

    /// Looks up `key` in the current language.
    pub fn translate(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.services()
            .translator
            .translate(&self.lang().current(), key, args)
    }

    pub fn cookie(&self) -> &Cookie {
        &self.inner.cookie
    }

    pub fn config(&self) -> &Config {
        &self.inner.shared.config
    }

    pub fn request(&self) -> &RequestContext {
        &self.inner.request
    }

    pub fn parse(&self) -> &Parser {
        &self.inner.parser
    }

    pub fn send(&self) -> &Sender {
        &self.inner.sender
    }

    /// Hands control back to the middleware chain.
    pub fn proceed(&self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.inner.request)
            .field("sender", &self.inner.sender)
            .finish_non_exhaustive()
    }
}
