use serde::Deserialize;

/// Selects which server-level tower layers are installed.
///
/// Route middleware registered through [`Router::middleware`](crate::Router::middleware)
/// is not affected; this only toggles the layers wrapped around the whole
/// service.
///
/// ```toml
/// [http]
/// exclude = ["timeout", "request-id"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMiddlewareConfig {
    Include(Vec<HttpMiddleware>),
    Exclude(Vec<HttpMiddleware>),
}

impl HttpMiddlewareConfig {
    pub fn is_enabled(&self, middleware: HttpMiddleware) -> bool {
        match self {
            HttpMiddlewareConfig::Include(list) => list.contains(&middleware),
            HttpMiddlewareConfig::Exclude(list) => !list.contains(&middleware),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum HttpMiddleware {
    /// `TraceLayer` request spans.
    Logging,
    /// `x-request-id` generation and propagation.
    RequestId,
    /// Trailing slash trimming (only when `trim_trailing_slash` is set).
    PathNormalization,
    /// `RequestBodyLimitLayer` with `max_payload_size_bytes`.
    MaxPayloadSize,
    /// `TimeoutLayer` with `request_timeout` (only when a timeout is set).
    Timeout,
}
