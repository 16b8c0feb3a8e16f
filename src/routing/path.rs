//! Route path normalization and pattern building.

use std::fmt;

/// Normalizes a route path: ensures a leading slash and strips a single
/// trailing slash unless the path is the root. An empty path stays empty.
///
/// ```
/// use axum_dispatch::format_path;
///
/// assert_eq!(format_path("users/"), "/users");
/// assert_eq!(format_path("/"), "/");
/// assert_eq!(format_path(""), "");
/// ```
pub fn format_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut formatted = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if formatted != "/" && formatted.ends_with('/') {
        formatted.pop();
    }
    formatted
}

/// Joins a router prefix and a route path into the absolute path stored on
/// a [`Route`](crate::Route). The result is never empty and never ends with
/// a slash, except for the root path.
pub fn join_path(prefix: &str, path: &str) -> String {
    let mut joined = format!("{prefix}{}", format_path(path));
    if joined.is_empty() {
        joined.push('/');
    }
    if joined != "/" && joined.ends_with('/') {
        joined.pop();
    }
    joined
}

/// Whether the path ends in a catch-all segment (`{name...}` or `{*name}`).
pub fn is_wildcard(path: &str) -> bool {
    path.contains("...") || path.contains("{*")
}

///
/// A method-qualified match pattern, e.g. `GET /users/{$}`.
///
/// Exact routes end with the `{$}` terminal marker. Wildcard routes keep
/// their catch-all suffix and match by prefix.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    method: String,
    path: String,
}

impl RoutePattern {
    pub fn new(method: &str, prefix: &str, path: &str) -> Self {
        let mut pattern = format!("{prefix}{}", format_path(path));
        if !is_wildcard(&pattern) {
            if !pattern.ends_with('/') {
                pattern.push('/');
            }
            pattern.push_str("{$}");
        }
        Self {
            method: method.to_string(),
            path: pattern,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The same pattern with parameter names erased, so `/users/{id}` and
    /// `/users/{name}` collide.
    pub(crate) fn shape(&self) -> String {
        let mut shape = String::with_capacity(self.path.len());
        let mut in_param = false;
        for ch in self.path.chars() {
            match ch {
                '{' => {
                    in_param = true;
                    shape.push('{');
                }
                '}' => {
                    in_param = false;
                    shape.push('}');
                }
                _ if in_param => {}
                _ => shape.push(ch),
            }
        }
        shape
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.method.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{} {}", self.method, self.path)
        }
    }
}

/// Converts a normalized route path to axum's matcher syntax. Catch-all
/// segments written as `{name...}` become `{*name}`.
pub(crate) fn to_axum_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            match segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix("...}"))
            {
                Some(name) => format!("{{*{name}}}"),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
