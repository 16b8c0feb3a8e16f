//! Response composition.
//!
//! A handler produces its output through exactly one `Sender` call. The call
//! records the payload in a [`SendState`] which the dispatcher turns into the
//! HTTP response (or the websocket reply) once the handler returns.

use {
    crate::{
        Error, ErrorKind, Interceptor, RequestContext, Result, ResultEnvelope,
        dispatch::{ConnectionId, WsHubs, WsWriter},
    },
    bytes::Bytes,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    serde::Serialize,
    std::sync::{Arc, Mutex, MutexGuard, PoisonError},
};

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_XML: &str = "application/xml";
pub(crate) const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// What the handler produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum DataKind {
    #[default]
    None,
    Json,
    Xml,
    Text,
    Bool,
    Error,
    Redirect,
    Stream,
}

#[derive(Debug, Default)]
pub(crate) struct SendState {
    pub kind: DataKind,
    pub body: Bytes,
    pub content_type: Option<&'static str>,
    /// Explicit status set through [`Sender::status`].
    pub status: Option<StatusCode>,
    /// Redirect location or download file name.
    pub value: String,
    pub headers: HeaderMap,
    /// Kind of the error emitted through [`Sender::error`].
    pub error_kind: Option<ErrorKind>,
}

pub struct Sender {
    request: RequestContext,
    interceptor: Arc<Interceptor>,
    hubs: WsHubs,
    connection: Option<ConnectionId>,
    state: Mutex<SendState>,
}

impl Sender {
    pub(crate) fn new(
        request: RequestContext,
        interceptor: Arc<Interceptor>,
        hubs: WsHubs,
        connection: Option<ConnectionId>,
    ) -> Self {
        Self {
            request,
            interceptor,
            hubs,
            connection,
            state: Mutex::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overrides the status code of the response.
    pub fn status(&self, status: StatusCode) -> &Self {
        self.state().status = Some(status);
        self
    }

    /// Adds a response header.
    pub fn header(&self, name: &str, value: &str) -> Result<&Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::invalid_input(format!("invalid header name {name:?}: {err}")))?;
        let value = HeaderValue::from_str(value)?;
        self.state().headers.append(name, value);
        Ok(self)
    }

    ///
    /// Responds with `{"error": "..."}`.
    ///
    /// The status defaults to the one of the error kind (400 for handler
    /// errors) unless [`status`](Self::status) was called.
    ///
    pub fn error(&self, err: impl Into<Error>) -> Result<()> {
        let err = self.interceptor.error(&self.request, err.into());
        let body = serde_json::to_vec(&err.to_envelope())?;
        self.emit(DataKind::Error, body.into(), Some(CONTENT_TYPE_JSON), |state| {
            state.error_kind = Some(err.kind());
        });
        Ok(())
    }

    /// Responds with `{"result": value}`.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let value = self
            .interceptor
            .json(&self.request, serde_json::to_value(value)?);
        let body = serde_json::to_vec(&ResultEnvelope { result: value })?;
        self.emit(DataKind::Json, body.into(), Some(CONTENT_TYPE_JSON), |_| {});
        Ok(())
    }

    /// Responds with the XML serialization of `value`, without an envelope.
    pub fn xml<T: Serialize>(&self, value: &T) -> Result<()> {
        let xml = self
            .interceptor
            .xml(&self.request, quick_xml::se::to_string(value)?);
        self.emit(DataKind::Xml, xml.into(), Some(CONTENT_TYPE_XML), |_| {});
        Ok(())
    }

    /// Responds with `{"result": "text"}`.
    pub fn text(&self, value: impl Into<String>) -> Result<()> {
        let value = self.interceptor.text(&self.request, value.into());
        let body = serde_json::to_vec(&ResultEnvelope { result: value })?;
        self.emit(DataKind::Text, body.into(), Some(CONTENT_TYPE_JSON), |_| {});
        Ok(())
    }

    /// Responds with `{"result": true|false}`.
    pub fn bool(&self, value: bool) -> Result<()> {
        let value = self.interceptor.bool(&self.request, value);
        let body = serde_json::to_vec(&ResultEnvelope { result: value })?;
        self.emit(DataKind::Bool, body.into(), Some(CONTENT_TYPE_JSON), |_| {});
        Ok(())
    }

    /// Redirects to `url`, with `302 Found` unless another status was set.
    pub fn redirect(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        self.emit(DataKind::Redirect, Bytes::new(), None, |state| {
            state.value = url;
        });
        Ok(())
    }

    /// Responds with a file download.
    pub fn file(&self, name: impl Into<String>, data: impl Into<Bytes>) -> Result<()> {
        let name = name.into();
        self.emit(
            DataKind::Stream,
            data.into(),
            Some(CONTENT_TYPE_OCTET_STREAM),
            |state| state.value = name,
        );
        Ok(())
    }

    /// A writer for the websocket hub registered under `name`.
    pub fn ws(&self, name: &str) -> Result<WsWriter> {
        let hub = self
            .hubs
            .get(name)
            .ok_or_else(|| Error::invalid_websocket(name))?;
        Ok(WsWriter::new(hub, self.connection))
    }

    /// Whether nothing has been sent yet.
    pub fn is_pending(&self) -> bool {
        self.state().kind == DataKind::None
    }

    fn emit(
        &self,
        kind: DataKind,
        body: Bytes,
        content_type: Option<&'static str>,
        finish: impl FnOnce(&mut SendState),
    ) {
        let mut state = self.state();
        if state.kind != DataKind::None {
            tracing::warn!(
                path = %self.request.path(),
                sent = ?state.kind,
                ignored = ?kind,
                "Response already sent, ignoring"
            );
            return;
        }
        state.kind = kind;
        state.body = body;
        state.content_type = content_type;
        finish(&mut state);
    }

    pub(crate) fn take_state(&self) -> SendState {
        std::mem::take(&mut *self.state())
    }

    pub(crate) fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("connection", &self.connection)
            .field("state", &*self.state())
            .finish()
    }
}
