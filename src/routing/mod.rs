//!
//! Route registration.
//!
//! A [`Router`] records routes into a table shared by all of its groups. Each
//! route captures the middleware registered on its router at the time of the
//! call, followed by the authentication middleware of the firewalls whose
//! patterns match the route path. The table is turned into an
//! `axum::Router` when the [`Server`](crate::Server) starts.
//!
//! ```
//! use axum_dispatch::{Config, Context, Result, Server};
//!
//! async fn list_users(c: Context) -> Result<()> {
//!     c.send().json(&["ada", "grace"])
//! }
//!
//! async fn audit(c: Context) -> Result<()> {
//!     tracing::info!(path = %c.request().path(), "audit");
//!     c.proceed()
//! }
//!
//! # fn main() -> Result<()> {
//! let mut server = Server::new(Config::default().with_prefix("/api"))?;
//! let mut admin = server.group("/admin");
//! admin.middleware(audit).get("/users", list_users);
//!
//! assert_eq!(server.routes()[0].to_string(), "GET /api/admin/users");
//! # Ok(())
//! # }
//! ```
//!
mod firewall;
mod path;

pub use firewall::{Firewall, compile_firewalls, find_firewalls_with_path};
pub use path::{RoutePattern, format_path, is_wildcard, join_path};

use {
    crate::{
        Error, Handler, Hook, Interceptor, Result,
        context::Shared,
        dispatch::{BoxHandler, Endpoint, WsHubs},
    },
    axum::{
        extract::Request,
        routing::{MethodFilter, MethodRouter, get_service},
    },
    firewall::firewall_middleware,
    path::to_axum_path,
    std::{
        collections::HashMap,
        fmt,
        path::PathBuf,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
    tower_http::services::ServeDir,
};

/// The method a route answers to. Websocket routes upgrade `GET` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Ws,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Ws => "WS",
        }
    }

    /// The HTTP method the route occupies in the router.
    fn http_method(&self) -> &'static str {
        match self {
            RouteMethod::Ws => "GET",
            method => method.as_str(),
        }
    }

    pub(crate) fn filter(&self) -> MethodFilter {
        match self {
            RouteMethod::Get | RouteMethod::Ws => MethodFilter::GET,
            RouteMethod::Post => MethodFilter::POST,
            RouteMethod::Put => MethodFilter::PUT,
            RouteMethod::Patch => MethodFilter::PATCH,
            RouteMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered route. Immutable once registered.
#[derive(Debug, Clone)]
pub struct Route {
    method: RouteMethod,
    path: String,
    firewalls: Vec<Firewall>,
}

impl Route {
    pub fn method(&self) -> RouteMethod {
        self.method
    }

    /// Absolute path including the router prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Firewalls guarding the route, in configuration order.
    pub fn firewalls(&self) -> &[Firewall] {
        &self.firewalls
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[derive(Default)]
struct Scope {
    interceptor: Interceptor,
    hook: Hook,
}

struct PendingRoute {
    route: Route,
    middlewares: Vec<BoxHandler>,
    handler: BoxHandler,
    scope: usize,
    ws: Option<String>,
}

/// The route table shared by a router and its groups.
struct Registry {
    firewalls: Vec<Firewall>,
    routes: Vec<PendingRoute>,
    scopes: Vec<Scope>,
    statics: Vec<(String, PathBuf)>,
    hubs: WsHubs,
}

///
/// Registers routes, middleware and the interceptor and hook of a group.
///
/// Obtained from [`Server`](crate::Server) (which dereferences to its root
/// router) or from [`Router::group`]. Registration happens before the server
/// starts; the table is read-only afterwards.
///
#[derive(Clone)]
pub struct Router {
    registry: Arc<Mutex<Registry>>,
    prefix: String,
    middlewares: Vec<BoxHandler>,
    scope: usize,
}

impl Router {
    pub(crate) fn new(prefix: &str, firewalls: Vec<Firewall>) -> Self {
        let registry = Registry {
            firewalls,
            routes: Vec::new(),
            scopes: vec![Scope::default()],
            statics: Vec::new(),
            hubs: WsHubs::default(),
        };
        Self {
            registry: Arc::new(Mutex::new(registry)),
            prefix: extend_prefix("", prefix),
            middlewares: Vec::new(),
            scope: 0,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The path prefix of this router, empty at the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    ///
    /// A child router sharing the route table.
    ///
    /// The child starts with a copy of the current middleware list (later
    /// `middleware` calls on the parent do not reach it), its own prefix
    /// extended by `prefix`, and an empty interceptor and hook.
    ///
    pub fn group(&self, prefix: &str) -> Router {
        let scope = {
            let mut registry = self.registry();
            registry.scopes.push(Scope::default());
            registry.scopes.len() - 1
        };
        Router {
            registry: self.registry.clone(),
            prefix: extend_prefix(&self.prefix, prefix),
            middlewares: self.middlewares.clone(),
            scope,
        }
    }

    /// Appends a middleware for routes registered on this router from now on.
    pub fn middleware<H: Handler>(&mut self, middleware: H) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Replaces the interceptor of this router.
    pub fn intercept(&mut self, interceptor: Interceptor) -> &mut Self {
        self.registry().scopes[self.scope].interceptor = interceptor;
        self
    }

    /// Replaces the hook of this router.
    pub fn hook(&mut self, hook: Hook) -> &mut Self {
        self.registry().scopes[self.scope].hook = hook;
        self
    }

    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.add(RouteMethod::Get, path, Arc::new(handler), None)
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.add(RouteMethod::Post, path, Arc::new(handler), None)
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.add(RouteMethod::Put, path, Arc::new(handler), None)
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.add(RouteMethod::Patch, path, Arc::new(handler), None)
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> &mut Self {
        self.add(RouteMethod::Delete, path, Arc::new(handler), None)
    }

    ///
    /// Registers a websocket route backed by the hub `name`.
    ///
    /// The middleware runs once against the upgrade request. After the
    /// upgrade, `handler` runs once per inbound message with the message
    /// bytes available through [`Parser`](crate::Parser); whatever it sends
    /// is written back to the connection the message came from.
    ///
    pub fn ws<H: Handler>(&mut self, path: &str, name: &str, handler: H) -> &mut Self {
        self.registry().hubs.register(name);
        self.add(
            RouteMethod::Ws,
            path,
            Arc::new(handler),
            Some(name.to_string()),
        )
    }

    ///
    /// Serves the files of `dir` below `path`.
    ///
    /// Static directories bypass the dispatch pipeline: no middleware,
    /// firewall, interceptor or hook applies to them. Mounting at `/`
    /// serves the directory for every path no route matches.
    ///
    pub fn static_dir(&mut self, path: &str, dir: impl Into<PathBuf>) -> &mut Self {
        let path = join_path(&self.prefix, path);
        let dir = dir.into();
        tracing::debug!(path = %path, dir = %dir.display(), "Static directory registered");
        self.registry().statics.push((path, dir));
        self
    }

    /// All registered routes, in registration order.
    pub fn routes(&self) -> Vec<Route> {
        self.registry()
            .routes
            .iter()
            .map(|pending| pending.route.clone())
            .collect()
    }

    pub(crate) fn statics(&self) -> Vec<(String, PathBuf)> {
        self.registry().statics.clone()
    }

    pub(crate) fn hubs(&self) -> WsHubs {
        self.registry().hubs.clone()
    }

    fn add(
        &mut self,
        method: RouteMethod,
        path: &str,
        handler: BoxHandler,
        ws: Option<String>,
    ) -> &mut Self {
        let path = join_path(&self.prefix, path);
        let mut middlewares = self.middlewares.clone();
        {
            let mut registry = self.registry();
            let firewalls = find_firewalls_with_path(&path, &registry.firewalls);
            middlewares.extend(firewall_middleware(&firewalls));

            let pattern = RoutePattern::new(method.as_str(), "", &path);
            tracing::debug!(
                route = %pattern,
                firewalls = ?firewalls.iter().map(Firewall::name).collect::<Vec<_>>(),
                "Route registered"
            );
            registry.routes.push(PendingRoute {
                route: Route {
                    method,
                    path,
                    firewalls,
                },
                middlewares,
                handler,
                scope: self.scope,
                ws,
            });
        }
        self
    }

    ///
    /// Builds the `axum::Router` serving the route table.
    ///
    /// Fails when two routes occupy the same method and path (websocket
    /// routes occupy `GET`), when routes differ only in parameter names, or
    /// when a static directory overlaps a route.
    ///
    pub(crate) fn build(&self, shared: Arc<Shared>) -> Result<axum::Router> {
        let registry = self.registry();
        let scopes: Vec<(Arc<Interceptor>, Arc<Hook>)> = registry
            .scopes
            .iter()
            .map(|scope| (Arc::new(scope.interceptor.clone()), Arc::new(scope.hook.clone())))
            .collect();

        let mut occupied: HashMap<String, &Route> = HashMap::new();
        let mut shapes: HashMap<String, String> = HashMap::new();
        let mut method_routers: Vec<(String, MethodRouter)> = Vec::new();

        for pending in &registry.routes {
            let route = &pending.route;
            let axum_path = to_axum_path(&route.path);
            let shape = RoutePattern::new("", "", &axum_path).shape();

            let key = format!("{} {shape}", route.method.http_method());
            if let Some(existing) = occupied.insert(key, route) {
                return Err(Error::config(format!(
                    "duplicate route: {route} conflicts with {existing}"
                )));
            }
            match shapes.get(&shape) {
                Some(known) if *known != axum_path => {
                    return Err(Error::config(format!(
                        "route {route} conflicts with {known}: parameter names differ"
                    )));
                }
                Some(_) => {}
                None => {
                    shapes.insert(shape, axum_path.clone());
                }
            }

            let (interceptor, hook) = scopes[pending.scope].clone();
            let endpoint = Arc::new(Endpoint {
                route: route.clone(),
                middlewares: Arc::from(pending.middlewares.as_slice()),
                handler: pending.handler.clone(),
                interceptor,
                hook,
                shared: shared.clone(),
                ws: pending.ws.clone(),
            });

            let index = match method_routers.iter().position(|(path, _)| *path == axum_path) {
                Some(index) => index,
                None => {
                    method_routers.push((axum_path, MethodRouter::new()));
                    method_routers.len() - 1
                }
            };
            let (path, method_router) = method_routers.remove(index);
            let method_router = if pending.ws.is_some() {
                method_router.on(route.method.filter(), move |req: Request| {
                    let endpoint = endpoint.clone();
                    async move { endpoint.upgrade(req).await }
                })
            } else {
                method_router.on(route.method.filter(), move |req: Request| {
                    let endpoint = endpoint.clone();
                    async move { endpoint.dispatch(req).await }
                })
            };
            method_routers.insert(index, (path, method_router));
        }

        check_statics(&registry.statics, &registry.routes)?;

        let mut router = axum::Router::new();
        for (path, method_router) in method_routers {
            router = router.route(&path, method_router);
        }
        for (path, dir) in &registry.statics {
            let service = get_service(ServeDir::new(dir).append_index_html_on_directories(true));
            router = if path == "/" {
                router.fallback_service(service)
            } else {
                router.nest_service(path, service)
            };
        }
        Ok(router)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("middlewares", &self.middlewares.len())
            .field("routes", &self.registry().routes.len())
            .finish()
    }
}

fn extend_prefix(prefix: &str, extension: &str) -> String {
    let mut extended = format!("{prefix}{}", format_path(extension));
    if extended.ends_with('/') {
        extended.pop();
    }
    extended
}

fn check_statics(statics: &[(String, PathBuf)], routes: &[PendingRoute]) -> Result<()> {
    for (index, (path, _)) in statics.iter().enumerate() {
        if statics[..index].iter().any(|(other, _)| other == path) {
            return Err(Error::config(format!("duplicate static directory: {path}")));
        }
        if path == "/" {
            continue;
        }
        let nested = format!("{path}/");
        if let Some(pending) = routes
            .iter()
            .find(|pending| pending.route.path == *path || pending.route.path.starts_with(&nested))
        {
            return Err(Error::config(format!(
                "static directory {path} overlaps route {}",
                pending.route
            )));
        }
    }
    Ok(())
}
