//!
//! Configuration for the dispatch server.
//!
//! A configuration can be created in several ways:
//! - From an environment-specific TOML file via `Config::from_rust_env` or `Config::from_toml_file`
//! - From a TOML string via `Config::from_toml` (or `str::parse`)
//! - Constructed programmatically via the builder methods on `Config`
//!
//! In the TOML-based methods, environment variables can be referenced using the
//! {{ VAR_NAME }} syntax and are substituted before parsing, which keeps secrets
//! such as API keys out of the files.
//!
//! Sections:
//!
//! - `AppConfig` (`[app]`) application name used in the startup banner
//! - `HttpConfig` (`[http]`) listener and server-level layers
//! - `RouterConfig` (`[router]`) global route prefix
//! - `ParserConfig` (`[parser]`) multipart limits
//! - `SecurityConfig` (`[security]`) firewalls and built-in credentials
//! - `LocalizationConfig` (`[localization]`) languages
//! - `LoggingConfig` (`[logging]`) log format
//!
mod app;
mod http;
mod localization;
mod logging;
mod security;

pub use app::*;
pub use http::*;
pub use localization::*;
pub use logging::*;
pub use security::*;

pub use byte_unit::Byte;

use {
    crate::{Error, Result, utils::replace_handlebars_with_env},
    serde::Deserialize,
    std::{env, fs, str::FromStr, time::Duration},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    ///
    /// Loads the configuration from a file based on the RUST_ENV environment variable.
    /// Fails when RUST_ENV is not set.
    ///
    pub fn from_rust_env() -> Result<Config> {
        Self::from_toml_file(env::var("RUST_ENV")?)
    }

    ///
    /// Given an environment name, loads "config/{env}.toml", substitutes any
    /// environment variables, and returns a Config struct.
    ///
    pub fn from_toml_file(env: impl AsRef<str>) -> Result<Config> {
        let path = format!("config/{}.toml", env.as_ref());
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    ///
    /// Parses a configuration string in TOML format into a Config struct.
    ///
    pub fn from_toml(toml_str: &str) -> Result<Config> {
        toml_str.parse()
    }

    /// Sets the application name shown in the startup banner.
    pub fn with_app_name(mut self, name: &str) -> Self {
        self.app.name = name.into();
        self
    }

    /// Sets the HTTP server bind address of the HttpConfig.
    pub fn with_bind_addr<S: AsRef<str>>(mut self, addr: S) -> Self {
        self.http.bind_addr = addr.as_ref().into();
        self
    }

    /// Sets the HTTP server bind port of the HttpConfig.
    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.http.bind_port = port;
        self
    }

    /// Sets the request timeout duration of the HttpConfig.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http.request_timeout = Some(timeout);
        self
    }

    /// Sets the maximum payload size in bytes of the HttpConfig.
    pub fn with_max_payload_size_bytes(mut self, size: u64) -> Self {
        self.http.max_payload_size_bytes = Byte::from_u64(size);
        self
    }

    /// Enables or disables trailing slash trimming in the HttpConfig.
    pub fn with_trim_trailing_slash(mut self, enable: bool) -> Self {
        self.http.trim_trailing_slash = enable;
        self
    }

    /// Activates only the listed server-level layers.
    pub fn with_included_middlewares(mut self, middlewares: Vec<HttpMiddleware>) -> Self {
        self.http.middleware = Some(HttpMiddlewareConfig::Include(middlewares));
        self
    }

    /// Activates all server-level layers except the listed ones.
    pub fn with_excluded_middlewares(mut self, middlewares: Vec<HttpMiddleware>) -> Self {
        self.http.middleware = Some(HttpMiddlewareConfig::Exclude(middlewares));
        self
    }

    /// Sets the global route prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.router.prefix = prefix.into();
        self
    }

    /// Sets the multipart limit in megabytes.
    pub fn with_parser_limit(mut self, megabytes: u64) -> Self {
        self.parser.limit = megabytes;
        self
    }

    /// Appends a firewall rule.
    pub fn with_firewall(mut self, firewall: FirewallConfig) -> Self {
        self.security.firewalls.push(firewall);
        self
    }

    /// Sets the credentials of the built-in authentication provider.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.security.auth = Some(auth);
        self
    }

    /// Sets the localization configuration.
    pub fn with_localization(mut self, localization: LocalizationConfig) -> Self {
        self.localization = localization;
        self
    }

    /// Sets the log format of the LoggingConfig.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.logging.format = format;
        self
    }

    /// Ensures that the configuration is valid.
    /// Most values have sensible defaults; this checks the ones that can be
    /// inconsistent, such as firewall patterns and the main language.
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.router.validate()?;
        self.parser.validate()?;
        self.security.validate()?;
        self.localization.validate()?;
        self.logging.validate()?;

        if self.parser.limit_bytes() > self.http.max_payload_size_bytes.as_u64()
            && self.http.is_enabled(HttpMiddleware::MaxPayloadSize)
        {
            tracing::warn!(
                parser_limit_bytes = self.parser.limit_bytes(),
                max_payload_size_bytes = self.http.max_payload_size_bytes.as_u64(),
                "Multipart limit exceeds max_payload_size_bytes; large uploads will be rejected with 413"
            );
        }

        Ok(())
    }

    ///
    /// Sets up the tracing subscriber for logging based on the LoggingConfig.
    ///
    /// NOTE: This should be called early during startup to ensure logging is configured
    ///       before any log messages are emitted.
    ///
    pub fn setup_tracing(&self) {
        use tracing_subscriber::{EnvFilter, prelude::*};
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directives = self.logging.filter.as_deref().unwrap_or("info");
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
        });
        match self.logging.format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().json())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Default => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Compact => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().compact())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .with(env_filter)
                    .try_init();
            }
        }
    }
}

///
/// Parses a configuration string with references to environment variables
/// into a Config struct by substituting the environment variables and then
/// parsing the resulting TOML.
///
impl FromStr for Config {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let config_file = replace_handlebars_with_env(s);
        let config = toml::from_str::<Config>(&config_file)?;
        Ok(config)
    }
}
