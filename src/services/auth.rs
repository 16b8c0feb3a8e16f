//! Authentication collaborators and the built-in credentials provider.
//!
//! [`BasicAuth`] authenticates requests using either:
//! - HTTP Basic Auth (RFC 7617) with username/password credentials
//! - API keys sent in a configurable header

use {
    crate::{AuthConfig, AuthMode, Error, RequestContext, Result, utils::constant_time_compare},
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    http::header::AUTHORIZATION,
    std::sync::Arc,
};

/// How a request was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    BasicAuth,
    ApiKey,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub method: AuthMethod,
    /// Username or the friendly name of the API key.
    pub name: String,
}

/// Recognizes the caller of a request.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    ///
    /// Returns the identity behind the request, `None` for anonymous
    /// requests, or an error for malformed credentials.
    ///
    async fn authenticate(
        &self,
        request: &RequestContext,
        database: &str,
    ) -> Result<Option<Identity>>;
}

/// Authentication handle returned by [`Context::auth`](crate::Context::auth).
#[derive(Clone)]
pub struct AuthManager {
    provider: Option<Arc<dyn AuthProvider>>,
    request: RequestContext,
    database: String,
}

impl AuthManager {
    pub(crate) fn new(
        provider: Option<Arc<dyn AuthProvider>>,
        request: RequestContext,
        database: &str,
    ) -> Self {
        Self {
            provider,
            request,
            database: database.to_string(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn identity(&self) -> Result<Option<Identity>> {
        match &self.provider {
            Some(provider) => provider.authenticate(&self.request, &self.database).await,
            None => {
                tracing::warn!(database = %self.database, "No authentication provider configured");
                Ok(None)
            }
        }
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.identity().await?.is_some())
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("database", &self.database)
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

///
/// Credentials provider backed by `[security.auth]`.
///
/// Installed automatically when the configuration has an auth section.
/// The database name is ignored.
///
#[derive(Debug, Clone)]
pub struct BasicAuth {
    config: AuthConfig,
}

impl BasicAuth {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn try_basic_auth(&self, request: &RequestContext) -> Result<Option<Identity>> {
        let Some(header) = request.headers().get(AUTHORIZATION) else {
            return Ok(None);
        };
        let header = header.to_str().map_err(|_| invalid_format())?;
        let Some(encoded) = header.strip_prefix("Basic ") else {
            return Ok(None);
        };
        let decoded = BASE64.decode(encoded).map_err(|_| invalid_format())?;
        let credentials = String::from_utf8(decoded).map_err(|_| invalid_format())?;
        let (username, password) = credentials.split_once(':').ok_or_else(invalid_format)?;

        let identity = self
            .config
            .users
            .iter()
            .find(|user| {
                user.username == username
                    && constant_time_compare(password.as_bytes(), user.password.0.as_bytes())
            })
            .map(|_| Identity {
                method: AuthMethod::BasicAuth,
                name: username.to_string(),
            });
        Ok(identity)
    }

    fn try_api_key(&self, request: &RequestContext) -> Result<Option<Identity>> {
        let Some(key) = request.headers().get(self.config.api_key_header.as_str()) else {
            return Ok(None);
        };
        let key = key.to_str().map_err(|_| invalid_format())?;

        let identity = self
            .config
            .api_keys
            .iter()
            .find(|api_key| constant_time_compare(key.as_bytes(), api_key.key.0.as_bytes()))
            .map(|api_key| Identity {
                method: AuthMethod::ApiKey,
                name: api_key
                    .name
                    .clone()
                    .unwrap_or_else(|| "api-key".to_string()),
            });
        Ok(identity)
    }
}

#[async_trait]
impl AuthProvider for BasicAuth {
    async fn authenticate(
        &self,
        request: &RequestContext,
        _database: &str,
    ) -> Result<Option<Identity>> {
        if matches!(self.config.mode, AuthMode::Basic | AuthMode::Either)
            && let Some(identity) = self.try_basic_auth(request)?
        {
            tracing::debug!(method = ?identity.method, name = %identity.name, "Request authenticated");
            return Ok(Some(identity));
        }
        if matches!(self.config.mode, AuthMode::ApiKey | AuthMode::Either)
            && let Some(identity) = self.try_api_key(request)?
        {
            tracing::debug!(method = ?identity.method, name = %identity.name, "Request authenticated");
            return Ok(Some(identity));
        }
        Ok(None)
    }
}

fn invalid_format() -> Error {
    Error::invalid_input("invalid authentication format")
}
