use {
    crate::{Route, utils::escape_string},
    axum::extract::{ConnectInfo, FromRequestParts, Query, RawPathParams},
    http::{HeaderMap, Method, Uri, request::Parts},
    std::{
        collections::HashMap,
        net::{IpAddr, SocketAddr},
        str::FromStr,
        sync::Arc,
    },
    tower_http::request_id::RequestId,
};

///
/// Read-only view of the inbound request.
///
/// Cheap to clone. The same view is handed to middleware, handlers,
/// interceptors and hooks, and for websocket routes it is the view of the
/// upgrade request shared by every message on the connection.
///
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<RequestInner>,
}

#[derive(Debug)]
struct RequestInner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: Vec<(String, String)>,
    query: HashMap<String, String>,
    peer: Option<SocketAddr>,
    request_id: Option<String>,
    route: Option<Route>,
}

impl RequestContext {
    pub(crate) async fn from_parts(parts: &mut Parts, route: Option<Route>) -> Self {
        // Routes without parameters reject the extractor; treat that as "no params".
        let params = match RawPathParams::from_request_parts(parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => Vec::new(),
        };
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .or_else(|| {
                parts
                    .headers
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
            })
            .map(str::to_string);

        Self {
            inner: Arc::new(RequestInner {
                method: parts.method.clone(),
                uri: parts.uri.clone(),
                headers: parts.headers.clone(),
                params,
                query,
                peer,
                request_id,
                route,
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// A path parameter captured by the route, e.g. `id` in `/users/{id}`.
    /// Wildcard tails are available under their name without the `...`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner
            .params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// A decoded query string value.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.inner.query.get(name).map(String::as_str)
    }

    ///
    /// A query value parsed into `T`. Markup characters are stripped before
    /// parsing, so string values are safe to echo back.
    ///
    /// Returns `None` when the parameter is missing or does not parse.
    ///
    pub fn query_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.query(name)
            .and_then(|value| escape_string(value).parse().ok())
    }

    /// The client address: the first `X-Forwarded-For` entry when present,
    /// otherwise the peer address of the connection.
    pub fn ip(&self) -> Option<IpAddr> {
        self.header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse().ok())
            .or_else(|| self.inner.peer.map(|addr| addr.ip()))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.inner.request_id.as_deref()
    }

    /// The route that matched this request.
    pub fn route(&self) -> Option<&Route> {
        self.inner.route.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(uri: &str) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                method: Method::GET,
                uri: uri.parse().unwrap_or_default(),
                headers: HeaderMap::new(),
                params: Vec::new(),
                query: HashMap::new(),
                peer: None,
                request_id: None,
                route: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn request(builder: http::request::Builder) -> RequestContext {
        let (mut parts, _) = builder.body(Body::empty()).unwrap().into_parts();
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4242))));
        RequestContext::from_parts(&mut parts, None).await
    }

    #[tokio::test]
    async fn test_query_values() {
        let req = request(
            http::Request::builder().uri("/search?q=rust%20lang&page=3&flag=true&name=%3Cb%3E"),
        )
        .await;
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query("q"), Some("rust lang"));
        assert_eq!(req.query_as::<u32>("page"), Some(3));
        assert_eq!(req.query_as::<bool>("flag"), Some(true));
        assert_eq!(req.query_as::<u32>("q"), None);
        assert_eq!(req.query_as::<String>("name").as_deref(), Some("&lt;b&gt;"));
        assert_eq!(req.query("missing"), None);
    }

    #[tokio::test]
    async fn test_ip_prefers_forwarded_for() {
        let req = request(
            http::Request::builder()
                .uri("/")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
        )
        .await;
        assert_eq!(req.ip(), Some("203.0.113.9".parse().unwrap()));

        let req = request(http::Request::builder().uri("/")).await;
        assert_eq!(req.ip(), Some("10.0.0.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_request_id_from_header() {
        let req = request(
            http::Request::builder()
                .uri("/")
                .header("x-request-id", "abc-123"),
        )
        .await;
        assert_eq!(req.request_id(), Some("abc-123"));
        assert_eq!(req.header("x-request-id"), Some("abc-123"));
    }
}
