//!
//! The dispatch server.
//!
//! A [`Server`] owns the configuration, the collaborators and the root
//! [`Router`]. It dereferences to the router, so routes are registered
//! directly on it:
//!
//! ```rust,no_run
//! use axum_dispatch::{Config, Context, Result, Server};
//!
//! async fn hello(c: Context) -> Result<()> {
//!     c.send().text("hello")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_rust_env()?;
//!     config.setup_tracing();
//!
//!     let mut server = Server::new(config)?;
//!     server.get("/", hello);
//!     server.run().await
//! }
//! ```
//!
//! When serving, the dispatch routes are wrapped in the tower-http layers
//! enabled in `[http]`: request ids, request spans, trailing slash trimming,
//! the payload limit and the request timeout.
//!

use {
    crate::{
        AuthProvider, CacheStore, Config, FileStore, HttpMiddleware, Mailer, Result, Router,
        Translator,
        context::Shared,
        routing::compile_firewalls,
        services::Services,
        shutdown::{ShutdownNotifier, ShutdownPhase, shutdown_signal},
        utils::RequestIdGenerator,
    },
    axum::{
        body::Body,
        extract::{DefaultBodyLimit, Request},
    },
    http::{HeaderName, StatusCode},
    std::{
        net::SocketAddr,
        ops::{Deref, DerefMut},
        sync::Arc,
    },
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tower::Layer,
    tower_http::{
        limit::RequestBodyLimitLayer,
        normalize_path::NormalizePathLayer,
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        timeout::TimeoutLayer,
        trace::TraceLayer,
    },
};

pub struct Server {
    config: Arc<Config>,
    router: Router,
    services: Services,
    shutdown: ShutdownNotifier,
}

impl Server {
    ///
    /// Validates the configuration and compiles its firewalls.
    ///
    /// When `[security.auth]` is present, the built-in
    /// [`BasicAuth`](crate::BasicAuth) provider is installed.
    ///
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let firewalls = compile_firewalls(&config.security.firewalls)?;
        let router = Router::new(&config.router.normalized_prefix(), firewalls);
        let services = Services::from_config(&config);
        Ok(Self {
            config: Arc::new(config),
            router,
            services,
            shutdown: ShutdownNotifier::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn with_auth_provider(mut self, provider: impl AuthProvider) -> Self {
        self.services.auth = Some(Arc::new(provider));
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: impl CacheStore) -> Self {
        self.services.cache = Arc::new(cache);
        self
    }

    #[must_use]
    pub fn with_file_store(mut self, files: impl FileStore) -> Self {
        self.services.files = Some(Arc::new(files));
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: impl Mailer) -> Self {
        self.services.mailer = Some(Arc::new(mailer));
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: impl Translator) -> Self {
        self.services.translator = Arc::new(translator);
        self
    }

    ///
    /// Registers a database handle under `name`.
    ///
    /// Handlers get it back with [`Context::db`](crate::Context::db). Once a
    /// database is registered, [`Context::auth`](crate::Context::auth) only
    /// accepts registered names.
    ///
    #[must_use]
    pub fn with_database<T: Send + Sync + 'static>(mut self, name: &str, db: T) -> Self {
        self.services.databases.insert(name.to_string(), Arc::new(db));
        self
    }

    pub fn shutdown_notifier(&self) -> ShutdownNotifier {
        self.shutdown.clone()
    }

    /// Cancelled when shutdown starts. Cancel it to stop a running server.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.cancellation_token()
    }

    ///
    /// Builds the `axum::Router` with the configured layers, without serving.
    ///
    /// Useful to drive the server with `tower::ServiceExt::oneshot` in tests.
    ///
    pub fn into_router(self) -> Result<axum::Router> {
        self.build_router()
    }

    fn build_router(&self) -> Result<axum::Router> {
        let shared = Arc::new(Shared {
            config: self.config.clone(),
            services: self.services.clone(),
            hubs: self.router.hubs(),
            shutdown: self.shutdown.cancellation_token(),
        });
        let mut router = self.router.build(shared)?;
        let http = &self.config.http;

        if http.is_enabled(HttpMiddleware::MaxPayloadSize) {
            router = router
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(
                    http.max_payload_size_bytes.as_u64() as usize,
                ));
        }

        if let Some(timeout) = http.request_timeout
            && http.is_enabled(HttpMiddleware::Timeout)
        {
            router = router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }

        // Routing happens before router layers run, so the trimming layer
        // has to wrap the whole router.
        if http.trim_trailing_slash && http.is_enabled(HttpMiddleware::PathNormalization) {
            router = axum::Router::new()
                .fallback_service(NormalizePathLayer::trim_trailing_slash().layer(router));
        }

        let request_id = http.is_enabled(HttpMiddleware::RequestId);
        let x_request_id = HeaderName::from_static("x-request-id");
        if request_id {
            router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
        }

        if http.is_enabled(HttpMiddleware::Logging) {
            router = router.layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                },
            ));
        }

        if request_id {
            router = router.layer(SetRequestIdLayer::new(x_request_id, RequestIdGenerator));
        }

        Ok(router)
    }

    fn log_routes(&self) {
        for route in self.router.routes() {
            let firewalls: Vec<&str> = route.firewalls().iter().map(|f| f.name()).collect();
            tracing::info!(
                method = %route.method(),
                path = %route.path(),
                firewalls = ?firewalls,
                "Route"
            );
        }
        for (path, dir) in self.router.statics() {
            tracing::info!(method = "GET", path = %path, dir = %dir.display(), "Static directory");
        }
    }

    ///
    /// Serves on the configured `bind_addr:bind_port` until shutdown.
    ///
    pub async fn run(self) -> Result<()> {
        let bind_addr = self.config.http.full_bind_addr();
        let listener = TcpListener::bind(&bind_addr).await?;
        self.serve(listener).await
    }

    ///
    /// Serves on `listener` until SIGINT, SIGTERM or cancellation of the
    /// [`cancellation_token`](Self::cancellation_token).
    ///
    /// After shutdown starts, in-flight requests get `shutdown_timeout` to
    /// finish before the server stops waiting for them.
    ///
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.build_router()?;
        let local_addr = listener.local_addr()?;

        self.log_routes();
        tracing::info!("{} running on -> http://{}", self.config.app.name, local_addr);

        let service = router.into_make_service_with_connect_info::<SocketAddr>();
        let shutdown_timeout = self.config.http.shutdown_timeout;
        let notifier = self.shutdown.clone();
        let mut shutdown_rx = notifier.subscribe();

        let serve_future = axum::serve(listener, service)
            .with_graceful_shutdown(shutdown_signal(shutdown_timeout, notifier.clone()));

        // The grace period only starts once shutdown has been initiated.
        tokio::select! {
            result = serve_future => {
                tracing::info!("Graceful shutdown completed");
                result?;
            }
            _ = async {
                loop {
                    match shutdown_rx.recv().await {
                        Ok(ShutdownPhase::Initiated) => break,
                        Ok(_) => continue,
                        Err(_) => std::future::pending::<()>().await,
                    }
                }
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
                notifier.emit(ShutdownPhase::GracePeriodEnded);
            }
        }

        Ok(())
    }
}

impl Deref for Server {
    type Target = Router;

    fn deref(&self) -> &Router {
        &self.router
    }
}

impl DerefMut for Server {
    fn deref_mut(&mut self) -> &mut Router {
        &mut self.router
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("app", &self.config.app.name)
            .field("router", &self.router)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}
