//! Per-router payload interceptors and post-response hooks.
//!
//! Both are plain values configured while routes are registered and frozen
//! behind an `Arc` when the server is built. Request handling only reads them.
//!
//! ```
//! use axum_dispatch::{Error, Hook, Interceptor};
//! use serde_json::json;
//!
//! let interceptor = Interceptor::new()
//!     .on_json(|_req, value| json!({ "data": value, "version": 2 }))
//!     .on_error(|_req, err| Error::new(err.kind(), format!("api: {err}")));
//!
//! let hook = Hook::new().on_error(|req, err| {
//!     tracing::warn!(path = %req.path(), error = %err, "request failed");
//! });
//! ```

use {
    crate::{Error, RequestContext},
    serde_json::Value,
    std::{fmt, sync::Arc},
};

type Rewrite<T> = Arc<dyn Fn(&RequestContext, T) -> T + Send + Sync>;
type Observer = Arc<dyn Fn(&RequestContext, Option<&Error>) + Send + Sync>;
type ErrorObserver = Arc<dyn Fn(&RequestContext, &Error) + Send + Sync>;

/// Optional rewrite functions, one per output kind.
///
/// JSON values are rewritten before they are wrapped in `{"result": ...}`,
/// XML after serialization, errors before they are wrapped in `{"error": ...}`.
#[derive(Clone, Default)]
pub struct Interceptor {
    json: Option<Rewrite<Value>>,
    xml: Option<Rewrite<String>>,
    text: Option<Rewrite<String>>,
    bool: Option<Rewrite<bool>>,
    error: Option<Rewrite<Error>>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_json<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, Value) -> Value + Send + Sync + 'static,
    {
        self.json = Some(Arc::new(f));
        self
    }

    pub fn on_xml<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, String) -> String + Send + Sync + 'static,
    {
        self.xml = Some(Arc::new(f));
        self
    }

    pub fn on_text<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, String) -> String + Send + Sync + 'static,
    {
        self.text = Some(Arc::new(f));
        self
    }

    pub fn on_bool<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, bool) -> bool + Send + Sync + 'static,
    {
        self.bool = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, Error) -> Error + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub(crate) fn json(&self, req: &RequestContext, value: Value) -> Value {
        apply(&self.json, req, value)
    }

    pub(crate) fn xml(&self, req: &RequestContext, value: String) -> String {
        apply(&self.xml, req, value)
    }

    pub(crate) fn text(&self, req: &RequestContext, value: String) -> String {
        apply(&self.text, req, value)
    }

    pub(crate) fn bool(&self, req: &RequestContext, value: bool) -> bool {
        apply(&self.bool, req, value)
    }

    pub(crate) fn error(&self, req: &RequestContext, value: Error) -> Error {
        apply(&self.error, req, value)
    }
}

fn apply<T>(rewrite: &Option<Rewrite<T>>, req: &RequestContext, value: T) -> T {
    match rewrite {
        Some(f) => f(req, value),
        None => value,
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("json", &self.json.is_some())
            .field("xml", &self.xml.is_some())
            .field("text", &self.text.is_some())
            .field("bool", &self.bool.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Callbacks fired once per request, after the response has been built.
///
/// `on_response` sees every outcome, `on_error` only failed ones. For error
/// responses the error is rebuilt from the `{"error": ...}` body that was
/// actually sent, so interceptor rewrites are visible here.
#[derive(Clone, Default)]
pub struct Hook {
    response: Option<Observer>,
    error: Option<ErrorObserver>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, Option<&Error>) + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestContext, &Error) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub(crate) fn fire(&self, req: &RequestContext, error: Option<&Error>) {
        if let Some(f) = &self.response {
            f(req, error);
        }
        if let (Some(f), Some(error)) = (&self.error, error) {
            f(req, error);
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("response", &self.response.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
