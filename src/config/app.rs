use {
    crate::{Error, Result, routing::format_path},
    serde::Deserialize,
};

/// Application identity, shown in the startup banner.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "AppConfig::default_name")]
    pub name: String,
}

impl AppConfig {
    fn default_name() -> String {
        env!("CARGO_PKG_NAME").into()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
        }
    }
}

///
/// Global routing settings.
///
/// The `prefix` is prepended to every registered route. It also determines
/// the `Path` attribute of cookies written through the request context,
/// which is always `format_path(prefix) + "/"`.
///
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub prefix: String,
}

impl RouterConfig {
    /// The normalized prefix, empty when no prefix is configured.
    pub fn normalized_prefix(&self) -> String {
        match format_path(&self.prefix).as_str() {
            "/" => String::new(),
            prefix => prefix.to_string(),
        }
    }

    /// Base path used for cookies (`/` when there is no prefix).
    pub fn cookie_path(&self) -> String {
        format!("{}/", self.normalized_prefix())
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefix.contains(char::is_whitespace) {
            return Err(Error::config(
                "Router prefix cannot contain whitespace. Set [router] prefix = \"/api\" in config.",
            ));
        }
        Ok(())
    }
}

/// Request body parsing limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// Maximum multipart form size in megabytes. Defaults to 32.
    #[serde(default = "ParserConfig::default_limit")]
    pub limit: u64,
}

impl ParserConfig {
    fn default_limit() -> u64 {
        32
    }

    /// The multipart limit converted to bytes (`limit << 20`).
    pub fn limit_bytes(&self) -> u64 {
        self.limit << 20
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::config(
                "Parser limit must be > 0. Set [parser] limit = 32 (megabytes) in config.",
            ));
        }
        if self.limit > (u64::MAX >> 20) {
            return Err(Error::config("Parser limit is too large."));
        }
        Ok(())
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
        }
    }
}
