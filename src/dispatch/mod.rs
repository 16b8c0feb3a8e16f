//! The per-request dispatch engine.
//!
//! Every registered route becomes an [`Endpoint`]. For each request the
//! endpoint builds a fresh [`Context`], runs the route middleware in order,
//! runs the handler when no middleware produced output, and materializes the
//! response. A panic anywhere in that chain is caught and turned into a
//! `500` error envelope without affecting other requests.

mod response;
mod websocket;

pub use websocket::{ConnectionId, WsHub, WsWriter};

pub(crate) use websocket::WsHubs;

use {
    crate::{Context, Hook, Interceptor, Parser, RequestContext, Result, Route, context::Shared},
    axum::{
        extract::{FromRequestParts, Request, ws::WebSocketUpgrade},
        response::{IntoResponse, Response},
    },
    futures_util::{FutureExt, future::BoxFuture},
    std::{any::Any, panic::AssertUnwindSafe, sync::Arc},
};

///
/// A request handler or middleware.
///
/// Implemented for every `Fn(Context) -> impl Future<Output = Result<()>>`,
/// so plain async closures and `async fn`s can be registered directly:
///
/// ```
/// use axum_dispatch::{Context, Result};
///
/// async fn hello(c: Context) -> Result<()> {
///     c.send().text("hello")
/// }
///
/// async fn audit(c: Context) -> Result<()> {
///     tracing::info!(path = %c.request().path(), "audit");
///     c.proceed()
/// }
/// ```
///
pub trait Handler: Send + Sync + 'static {
    fn call(&self, c: Context) -> BoxFuture<'static, Result<()>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, c: Context) -> BoxFuture<'static, Result<()>> {
        Box::pin(self(c))
    }
}

pub(crate) type BoxHandler = Arc<dyn Handler>;

/// A route with everything needed to serve it.
pub(crate) struct Endpoint {
    pub route: Route,
    pub middlewares: Arc<[BoxHandler]>,
    pub handler: BoxHandler,
    pub interceptor: Arc<Interceptor>,
    pub hook: Arc<Hook>,
    pub shared: Arc<Shared>,
    /// Hub name for websocket routes.
    pub ws: Option<String>,
}

impl Endpoint {
    fn context(&self, request: RequestContext, parser: Parser) -> Context {
        Context::new(
            self.shared.clone(),
            self.interceptor.clone(),
            request,
            parser,
            None,
        )
    }

    fn parser(&self, body: axum::body::Body, request: &RequestContext) -> Parser {
        Parser::from_body(
            body,
            request.headers(),
            self.shared.config.parser.limit_bytes(),
        )
    }

    pub(crate) async fn dispatch(self: Arc<Self>, req: Request) -> Response {
        let (mut parts, body) = req.into_parts();
        let request = RequestContext::from_parts(&mut parts, Some(self.route.clone())).await;
        let parser = self.parser(body, &request);
        let c = self.context(request, parser);

        match AssertUnwindSafe(self.run(c.clone())).catch_unwind().await {
            Ok(result) => response::materialize(&c, result, &self.hook),
            Err(panic) => self.recover(&c, panic),
        }
    }

    async fn run(&self, c: Context) -> Result<()> {
        self.run_middlewares(c.clone()).await?;
        if c.send().is_pending() {
            self.handler.call(c).await?;
        }
        Ok(())
    }

    /// Runs the middleware chain, stopping at the first error.
    async fn run_middlewares(&self, c: Context) -> Result<()> {
        for middleware in self.middlewares.iter() {
            if let Err(err) = middleware.call(c.clone()).await {
                tracing::debug!(route = %self.route, error = %err, "Middleware stopped the request");
                return Err(err);
            }
        }
        Ok(())
    }

    fn recover(&self, c: &Context, panic: Box<dyn Any + Send>) -> Response {
        let message = panic_message(panic.as_ref());
        tracing::error!(route = %self.route, panic = %message, "Handler panicked");
        response::recover(c, message, &self.hook)
    }

    ///
    /// Runs the middleware against the upgrade request, then hands the
    /// connection to the message loop.
    ///
    pub(crate) async fn upgrade(self: Arc<Self>, req: Request) -> Response {
        let (mut parts, body) = req.into_parts();
        let request = RequestContext::from_parts(&mut parts, Some(self.route.clone())).await;
        let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &()).await;
        let parser = self.parser(body, &request);
        let c = self.context(request.clone(), parser);

        match AssertUnwindSafe(self.run_middlewares(c.clone()))
            .catch_unwind()
            .await
        {
            Err(panic) => return self.recover(&c, panic),
            Ok(Err(err)) => return response::materialize(&c, Err(err), &self.hook),
            Ok(Ok(())) if !c.send().is_pending() => {
                return response::materialize(&c, Ok(()), &self.hook);
            }
            Ok(Ok(())) => {}
        }

        let upgrade = match upgrade {
            Ok(upgrade) => upgrade,
            Err(rejection) => return rejection.into_response(),
        };
        let name = self.ws.as_deref().unwrap_or_default();
        let Some(hub) = self.shared.hubs.get(name) else {
            let err = crate::Error::invalid_websocket(name);
            return response::materialize(&c, Err(err), &self.hook);
        };
        let headers = c.send().take_state().headers;
        let mut response =
            upgrade.on_upgrade(move |socket| self.serve_socket(socket, hub, request));
        response::apply_staged(&c, headers, &mut response);
        response
    }
}

/// The message carried by a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    }
}
