//! Websocket hubs and the per-message dispatch loop.
//!
//! Every `Router::ws` route owns a named [`WsHub`] holding the outbound
//! channel of each open connection. Handlers reach hubs through
//! [`Sender::ws`](crate::Sender::ws), which returns a [`WsWriter`].

use {
    super::{Endpoint, panic_message},
    crate::{Context, Error, Parser, RequestContext, Result, context::DataKind},
    axum::extract::ws::{Message, WebSocket},
    bytes::Bytes,
    dashmap::DashMap,
    futures_util::{FutureExt, SinkExt, StreamExt},
    serde::Serialize,
    std::{
        panic::AssertUnwindSafe,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
    },
    tokio::sync::mpsc,
};

/// Identifies a connection within its hub.
pub type ConnectionId = u64;

/// Open connections of one websocket route.
#[derive(Debug)]
pub struct WsHub {
    name: String,
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
}

impl WsHub {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, tx);
        (id, rx)
    }

    pub(crate) fn unregister(&self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    pub(crate) fn send(&self, id: ConnectionId, message: Message) -> Result<()> {
        let connection = self
            .connections
            .get(&id)
            .ok_or_else(|| Error::io(format!("websocket connection {id} is closed")))?;
        connection
            .send(message)
            .map_err(|_| Error::io(format!("websocket connection {id} is closed")))
    }

    /// Sends to every open connection, returning how many accepted the message.
    pub(crate) fn broadcast(&self, message: Message) -> usize {
        self.connections
            .iter()
            .filter(|connection| connection.value().send(message.clone()).is_ok())
            .count()
    }

    pub(crate) fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.iter().map(|c| *c.key()).collect();
        ids.sort_unstable();
        ids
    }
}

/// All hubs of a server, by name.
#[derive(Debug, Clone, Default)]
pub(crate) struct WsHubs(Arc<DashMap<String, Arc<WsHub>>>);

impl WsHubs {
    pub(crate) fn register(&self, name: &str) -> Arc<WsHub> {
        self.0
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(WsHub::new(name)))
            .clone()
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<WsHub>> {
        self.0.get(name).map(|hub| hub.clone())
    }
}

///
/// Writes to the connections of one hub.
///
/// When obtained while handling a websocket message, [`current`](Self::current)
/// is the connection that sent it.
///
#[derive(Debug, Clone)]
pub struct WsWriter {
    hub: Arc<WsHub>,
    current: Option<ConnectionId>,
}

impl WsWriter {
    pub(crate) fn new(hub: Arc<WsHub>, current: Option<ConnectionId>) -> Self {
        Self { hub, current }
    }

    pub fn current(&self) -> Option<ConnectionId> {
        self.current
    }

    /// Ids of the open connections, in connection order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.hub.ids()
    }

    pub fn broadcast_text(&self, text: impl Into<String>) -> usize {
        self.hub.broadcast(Message::Text(text.into().into()))
    }

    pub fn broadcast_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<usize> {
        let text = serde_json::to_string(value)?;
        Ok(self.broadcast_text(text))
    }

    pub fn send_text(&self, id: ConnectionId, text: impl Into<String>) -> Result<()> {
        self.hub.send(id, Message::Text(text.into().into()))
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, id: ConnectionId, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.send_text(id, text)
    }
}

impl Endpoint {
    /// Runs the message loop of an upgraded connection.
    pub(crate) async fn serve_socket(
        self: Arc<Self>,
        socket: WebSocket,
        hub: Arc<WsHub>,
        request: RequestContext,
    ) {
        let (id, mut outbound) = hub.register();
        tracing::info!(websocket = %hub.name(), connection = id, "Websocket connected");

        let (mut sink, mut stream) = socket.split();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let shutdown = self.shared.shutdown.clone();
        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = stream.next() => message,
            };
            let payload = match message {
                Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                Some(Ok(Message::Binary(data))) => data,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    tracing::debug!(websocket = %hub.name(), connection = id, error = %err, "Websocket read failed");
                    break;
                }
            };
            if let Some(reply) = self.dispatch_message(&request, id, payload).await
                && hub.send(id, reply).is_err()
            {
                break;
            }
        }

        hub.unregister(id);
        let _ = writer.await;
        tracing::debug!(websocket = %hub.name(), connection = id, "Websocket disconnected");
    }

    /// Runs the handler for one message and builds the reply sent back on
    /// the same connection, if the handler produced one.
    pub(crate) async fn dispatch_message(
        &self,
        request: &RequestContext,
        id: ConnectionId,
        payload: Bytes,
    ) -> Option<Message> {
        let c = Context::new(
            self.shared.clone(),
            self.interceptor.clone(),
            request.clone(),
            Parser::buffered(payload),
            Some(id),
        );
        let result = match AssertUnwindSafe(self.handler.call(c.clone()))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(route = %self.route, connection = id, panic = %message, "Websocket handler panicked");
                Err(Error::internal(message))
            }
        };
        message_reply(&c, result)
    }
}

fn message_reply(c: &Context, result: Result<()>) -> Option<Message> {
    let state = c.send().take_state();
    if let Err(err) = result {
        let err = c.send().interceptor().error(c.request(), err);
        tracing::debug!(path = %c.request().path(), error = %err, "Websocket message failed");
        let text = serde_json::to_string(&err.to_envelope())
            .unwrap_or_else(|_| "Internal Server Error".to_string());
        return Some(Message::Text(text.into()));
    }
    match state.kind {
        DataKind::None => None,
        DataKind::Stream => Some(Message::Binary(state.body)),
        DataKind::Redirect => {
            tracing::warn!(path = %c.request().path(), "Redirect has no meaning for websocket messages");
            None
        }
        _ => Some(Message::Text(
            String::from_utf8_lossy(&state.body).into_owned().into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_registry_reuses_hubs() {
        let hubs = WsHubs::default();
        let a = hubs.register("chat");
        let b = hubs.register("chat");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(hubs.get("chat").is_some());
        assert!(hubs.get("news").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_and_direct_send() {
        let hub = Arc::new(WsHub::new("chat"));
        let (first, mut rx1) = hub.register();
        let (second, mut rx2) = hub.register();
        let writer = WsWriter::new(hub.clone(), Some(first));

        assert_eq!(writer.connections(), vec![first, second]);
        assert_eq!(writer.broadcast_text("hello"), 2);
        assert_eq!(rx1.recv().await, Some(Message::Text("hello".into())));
        assert_eq!(rx2.recv().await, Some(Message::Text("hello".into())));

        writer.send_json(second, &serde_json::json!({"n": 1})).unwrap();
        assert_eq!(rx2.recv().await, Some(Message::Text(r#"{"n":1}"#.into())));
        assert_eq!(writer.current(), Some(first));
    }

    #[tokio::test]
    async fn test_send_to_closed_connection_fails() {
        let hub = Arc::new(WsHub::new("chat"));
        let (id, rx) = hub.register();
        drop(rx);
        let writer = WsWriter::new(hub.clone(), None);
        assert!(writer.send_text(id, "x").is_err());
        hub.unregister(id);
        assert!(writer.send_text(id, "x").is_err());
        assert_eq!(writer.broadcast_text("nobody"), 0);
    }
}
