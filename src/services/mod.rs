//!
//! Collaborators reachable from a [`Context`](crate::Context).
//!
//! Each capability is a trait so it can be replaced independently of the
//! others. A server starts with an in-memory cache, the passthrough
//! translator and, when `[security.auth]` is configured, the [`BasicAuth`]
//! provider. File storage, mail and databases are registered through the
//! `Server::with_*` builders.
//!
mod auth;
mod cache;
mod files;
mod mail;
mod translate;

pub use auth::{AuthManager, AuthMethod, AuthProvider, BasicAuth, Identity};
pub use cache::{CacheStore, MemoryCache};
pub use files::{FileStore, LocalFileStore};
pub use mail::{Mail, Mailer};
pub use translate::{Passthrough, Translator};

use {
    crate::Config,
    std::{any::Any, collections::HashMap, sync::Arc},
};

/// Type-erased database handle.
pub(crate) type Database = Arc<dyn Any + Send + Sync>;

/// The collaborator set shared by every request of a server.
#[derive(Clone)]
pub(crate) struct Services {
    pub auth: Option<Arc<dyn AuthProvider>>,
    pub cache: Arc<dyn CacheStore>,
    pub files: Option<Arc<dyn FileStore>>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub translator: Arc<dyn Translator>,
    pub databases: HashMap<String, Database>,
}

impl Services {
    pub(crate) fn from_config(config: &Config) -> Self {
        let mut services = Self::default();
        if let Some(auth) = &config.security.auth {
            services.auth = Some(Arc::new(BasicAuth::new(auth.clone())));
        }
        services
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            auth: None,
            cache: Arc::new(MemoryCache::default()),
            files: None,
            mailer: None,
            translator: Arc::new(Passthrough),
            databases: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut databases: Vec<_> = self.databases.keys().collect();
        databases.sort();
        f.debug_struct("Services")
            .field("auth", &self.auth.is_some())
            .field("files", &self.files.is_some())
            .field("mailer", &self.mailer.is_some())
            .field("databases", &databases)
            .finish_non_exhaustive()
    }
}
