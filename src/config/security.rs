//! Firewall rules and credentials for the built-in authentication provider.
//!
//! # Example
//!
//! ```toml
//! [[security.firewalls]]
//! name = "admin"
//! patterns = ["^/admin"]
//!
//! [security.auth]
//! mode = "either"
//! api_key_header = "X-API-Key"
//!
//! [[security.auth.users]]
//! username = "admin"
//! password = "{{ ADMIN_PASSWORD }}"
//!
//! [[security.auth.api_keys]]
//! key = "{{ API_KEY }}"
//! name = "frontend-service"
//! ```

use {
    crate::{Error, Result, utils::Sensitive},
    regex::Regex,
    serde::Deserialize,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Access-control rules, evaluated in this order.
    #[serde(default)]
    pub firewalls: Vec<FirewallConfig>,

    /// Credentials for the built-in [`BasicAuth`](crate::BasicAuth) provider.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl SecurityConfig {
    pub fn validate(&self) -> Result<()> {
        for firewall in &self.firewalls {
            firewall.validate()?;
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }
}

///
/// A pattern based access-control rule.
///
/// A route carries the firewall when the firewall is enabled and at least one
/// of its regular expressions matches the route's normalized path. Matching
/// happens once, when the route is registered.
///
#[derive(Debug, Clone, Deserialize)]
pub struct FirewallConfig {
    /// Friendly name used in logs and the route listing.
    #[serde(default)]
    pub name: String,

    #[serde(default = "FirewallConfig::default_enabled")]
    pub enabled: bool,

    /// Regular expressions matched against route paths.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl FirewallConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            patterns: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn default_enabled() -> bool {
        true
    }

    pub fn validate(&self) -> Result<()> {
        if self.patterns.is_empty() {
            return Err(Error::config(format!(
                "Firewall '{}' has no patterns. Add patterns = [\"^/admin\"] to the firewall.",
                self.name
            )));
        }
        for pattern in &self.patterns {
            Regex::new(pattern).map_err(|err| {
                Error::config(format!(
                    "Firewall '{}' has an invalid pattern '{pattern}': {err}",
                    self.name
                ))
            })?;
        }
        Ok(())
    }
}

/// Which credentials the built-in provider accepts.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Only HTTP Basic Auth (RFC 7617).
    Basic,
    /// Only API keys sent in `api_key_header`.
    ApiKey,
    /// Either of the above.
    #[default]
    Either,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub username: String,
    pub password: Sensitive<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiKey {
    pub key: Sensitive<String>,
    /// Friendly name, reported as the identity name.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// Header carrying the API key. Defaults to `X-API-Key`.
    #[serde(default = "AuthConfig::default_api_key_header")]
    pub api_key_header: String,

    #[serde(default)]
    pub users: Vec<AuthUser>,

    #[serde(default)]
    pub api_keys: Vec<AuthApiKey>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            api_key_header: Self::default_api_key_header(),
            users: Vec::new(),
            api_keys: Vec::new(),
        }
    }
}

impl AuthConfig {
    fn default_api_key_header() -> String {
        "X-API-Key".to_string()
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.users.push(AuthUser {
            username: username.into(),
            password: Sensitive::from(password),
        });
        self
    }

    pub fn with_api_key(mut self, key: &str, name: Option<&str>) -> Self {
        self.api_keys.push(AuthApiKey {
            key: Sensitive::from(key),
            name: name.map(String::from),
        });
        self
    }

    pub fn with_mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let has_users = !self.users.is_empty();
        let has_api_keys = !self.api_keys.is_empty();

        match self.mode {
            AuthMode::Basic if !has_users => {
                return Err(Error::config(
                    "Auth mode 'basic' requires at least one user. Add [[security.auth.users]] to config.",
                ));
            }
            AuthMode::ApiKey if !has_api_keys => {
                return Err(Error::config(
                    "Auth mode 'api_key' requires at least one API key. Add [[security.auth.api_keys]] to config.",
                ));
            }
            AuthMode::Either if !has_users && !has_api_keys => {
                return Err(Error::config(
                    "Auth requires at least one user or API key. Add credentials to config.",
                ));
            }
            _ => {}
        }

        for user in &self.users {
            if user.username.trim().is_empty() {
                return Err(Error::config("Auth username cannot be empty."));
            }
            if user.password.0.is_empty() {
                return Err(Error::config(
                    "Auth password cannot be empty. Use {{ ENV_VAR }} for secrets.",
                ));
            }
        }

        if self.api_keys.iter().any(|api_key| api_key.key.0.is_empty()) {
            return Err(Error::config(
                "API key cannot be empty. Use {{ ENV_VAR }} for secrets.",
            ));
        }

        if self.api_key_header.trim().is_empty() {
            return Err(Error::config("API key header name cannot be empty."));
        }

        Ok(())
    }
}
