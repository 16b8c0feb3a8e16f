//!
//! Small helpers shared by the configuration layer and the dispatch pipeline.
//!
//! - [`Sensitive`] hides secrets (passwords, API keys) from debug output
//! - [`RequestIdGenerator`] preserves or creates the `x-request-id` of a request
//! - [`replace_handlebars_with_env`] substitutes `{{ VAR }}` placeholders in config text
//! - [`escape_string`] strips markup characters from user supplied strings
//!

use {
    http::{HeaderValue, Request},
    regex::{Captures, Regex},
    serde::Deserialize,
    std::{env, sync::LazyLock},
    tower_http::request_id::{MakeRequestId, RequestId},
    uuid::{ContextV7, Timestamp, Uuid},
    zeroize::{Zeroize, ZeroizeOnDrop},
};

/// Matches `{{ VAR_NAME }}` with optional whitespace around the name.
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

/// A wrapper for secrets that prints as `Sensitive(****)` and zeroes its
/// memory when dropped.
///
/// The value stays reachable through the public field `0`.
///
/// ```
/// use axum_dispatch::Sensitive;
///
/// let api_key = Sensitive::from("secret-key-12345");
/// assert_eq!(format!("{api_key:?}"), "Sensitive(****)");
/// assert_eq!(api_key.0, "secret-key-12345");
/// ```
#[derive(Clone, Deserialize, Default, Zeroize, ZeroizeOnDrop)]
pub struct Sensitive<T: Default + Zeroize>(pub T);

impl Sensitive<String> {
    /// Creates a new `Sensitive<String>` from a string slice.
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Default + Zeroize + PartialEq> PartialEq for Sensitive<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Default + Zeroize> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sensitive(****)")
    }
}

/// Keeps an incoming `x-request-id` or generates a time-ordered UUIDv7.
///
/// Used by the server's `SetRequestIdLayer` so every dispatch log line and
/// every [`RequestContext`](crate::RequestContext) can be correlated.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, req: &Request<B>) -> Option<RequestId> {
        match req.headers().get("x-request-id") {
            Some(value) => Some(RequestId::new(value.clone())),
            None => {
                let cx = ContextV7::new().with_additional_precision();
                let uuid = Uuid::new_v7(Timestamp::now(cx));
                let value = HeaderValue::from_str(&uuid.to_string()).ok()?;
                Some(RequestId::new(value))
            }
        }
    }
}

/// Replaces `{{ VAR_NAME }}` placeholders with environment variable values.
///
/// Unset variables become the empty string (and a warning is logged).
///
/// ```
/// use axum_dispatch::replace_handlebars_with_env;
///
/// let result = replace_handlebars_with_env("Value: {{ SURELY_NOT_SET_ANYWHERE }}");
/// assert_eq!(result, "Value: ");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}

/// Escapes angle brackets and drops quote characters from a user supplied value.
///
/// Applied to string query parameters read through
/// [`RequestContext::query_as`](crate::RequestContext::query_as).
pub fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' | '"' | '`' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Compares two byte slices in constant time with respect to their contents.
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
