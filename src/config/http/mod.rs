mod middleware;

pub use middleware::*;

use {
    crate::{Error, Result},
    serde::Deserialize,
    std::time::Duration,
};

///
/// Configuration for the HTTP listener and the tower layers wrapped around
/// the dispatch routes.
///
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// IP address to bind the HTTP server to.
    /// The default `bind_addr` is "127.0.0.1".
    #[serde(default = "HttpConfig::default_bind_addr")]
    pub bind_addr: String,

    /// Port to bind the HTTP server to. Port 0 lets the OS pick one.
    /// The default `bind_port` is 3000.
    #[serde(default = "HttpConfig::default_bind_port")]
    pub bind_port: u16,

    /// Maximum allowed time for a request to complete before timing out.
    /// By default `request_timeout` is None.
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Maximum payload size in bytes for incoming HTTP requests.
    /// Requests with larger bodies are rejected with 413 Payload Too Large.
    /// By default `max_payload_size_bytes` is 32MiB, matching the default
    /// multipart limit of the parser.
    #[serde(default = "HttpConfig::default_max_payload_size_bytes")]
    pub max_payload_size_bytes: byte_unit::Byte,

    /// Whether or not to trim trailing slashes from the request path.
    /// By default `trim_trailing_slash` is set to true.
    #[serde(default = "HttpConfig::default_trim_trailing_slash")]
    pub trim_trailing_slash: bool,

    /// Maximum time to wait for in-flight requests during graceful shutdown.
    /// By default `shutdown_timeout` is set to 30 seconds.
    #[serde(
        default = "HttpConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,

    #[serde(flatten)]
    pub middleware: Option<HttpMiddlewareConfig>,
}

impl HttpConfig {
    ///
    /// Returns the full bind address as a string in the format "IP:PORT".
    ///
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    /// Whether a server-level layer should be installed.
    /// Everything is enabled when no include/exclude list is configured.
    pub fn is_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.middleware
            .as_ref()
            .is_none_or(|config| config.is_enabled(middleware))
    }

    fn default_bind_addr() -> String {
        "127.0.0.1".into()
    }

    fn default_bind_port() -> u16 {
        3000
    }

    fn default_max_payload_size_bytes() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(32 * 1024 * 1024)
    }

    fn default_trim_trailing_slash() -> bool {
        true
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::config(
                "HTTP bind_addr is required. Set [http] bind_addr = \"0.0.0.0\" or \"127.0.0.1\" in config.",
            ));
        }

        if self.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(Error::config(
                "HTTP bind_addr must be a valid IP address. Examples: \"127.0.0.1\", \"0.0.0.0\", \"::1\"",
            ));
        }

        if self.max_payload_size_bytes.as_u64() == 0 {
            return Err(Error::config(
                "HTTP max_payload_size_bytes must be > 0. Set [http] max_payload_size_bytes = \"32MiB\" in config.",
            ));
        }

        if self.request_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::config(
                "HTTP request_timeout must be > 0 when set.",
            ));
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind_addr: Self::default_bind_addr(),
            bind_port: Self::default_bind_port(),
            request_timeout: None,
            max_payload_size_bytes: Self::default_max_payload_size_bytes(),
            trim_trailing_slash: Self::default_trim_trailing_slash(),
            shutdown_timeout: Self::default_shutdown_timeout(),
            middleware: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn test_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.full_bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.max_payload_size_bytes.as_u64(), 32 * 1024 * 1024);
        assert!(config.trim_trailing_slash);
        assert!(config.is_enabled(HttpMiddleware::Logging));
    }

    #[test]
    fn test_exclude_list_from_toml() {
        let config: Config = r#"
[http]
bind_port = 8080
exclude = ["timeout", "request-id"]
        "#
        .parse()
        .unwrap();
        assert_eq!(config.http.bind_port, 8080);
        assert!(!config.http.is_enabled(HttpMiddleware::Timeout));
        assert!(!config.http.is_enabled(HttpMiddleware::RequestId));
        assert!(config.http.is_enabled(HttpMiddleware::Logging));
    }

    #[test]
    fn test_include_list_from_toml() {
        let config: Config = r#"
[http]
include = ["logging"]
        "#
        .parse()
        .unwrap();
        assert!(config.http.is_enabled(HttpMiddleware::Logging));
        assert!(!config.http.is_enabled(HttpMiddleware::MaxPayloadSize));
    }

    #[test]
    fn test_durations_and_sizes_from_toml() {
        let config: Config = r#"
[http]
request_timeout = "5s"
shutdown_timeout = "2s"
max_payload_size_bytes = "1MiB"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.http.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.http.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.http.max_payload_size_bytes.as_u64(), 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_bad_bind_addr() {
        let mut config = HttpConfig::default();
        config.bind_addr = "not-an-ip-address".into();
        assert!(config.validate().is_err());
        config.bind_addr = "".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = HttpConfig {
            request_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
