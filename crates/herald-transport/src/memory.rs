//! An in-process transport backed by tokio channels.
//!
//! [`MemoryTransport`] is what the dispatcher talks to; the paired
//! [`MemoryHandle`] is the "remote end" a test or demo drives: it injects raw
//! events and observes what the bot sends back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use herald_core::{
    AuthError, BotIdentity, ConnectionHandle, Credentials, OutgoingMessage, RawEvent, SendError,
    SendResult, Transport, TransportError, TransportResult,
};

/// One item queued for [`Transport::receive`].
#[derive(Debug)]
enum Inbound {
    Event(RawEvent),
    Error(TransportError),
    End,
}

/// A message the bot sent through the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: String,
    pub message: OutgoingMessage,
}

#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    closed: AtomicBool,
    delivered: AtomicUsize,
    close_calls: AtomicUsize,
}

/// The dispatcher-facing half of an in-memory connection.
pub struct MemoryTransport {
    bot: BotIdentity,
    required_token: Option<String>,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<SentMessage>,
    shared: Arc<Shared>,
}

/// The remote-end half of an in-memory connection.
pub struct MemoryHandle {
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound: Mutex<mpsc::UnboundedReceiver<SentMessage>>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Creates a connected pair for a bot with the given identity.
    pub fn pair(bot: BotIdentity) -> (Self, MemoryHandle) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let transport = Self {
            bot,
            required_token: None,
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            shared: Arc::clone(&shared),
        };
        let handle = MemoryHandle {
            inbound: in_tx,
            outbound: Mutex::new(out_rx),
            shared,
        };
        (transport, handle)
    }

    /// Rejects `connect` unless the credentials carry exactly this token.
    pub fn require_token(mut self, token: impl Into<String>) -> Self {
        self.required_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, credentials: &Credentials) -> Result<ConnectionHandle, AuthError> {
        if let Some(required) = &self.required_token
            && required != &credentials.token
        {
            return Err(AuthError::InvalidCredentials("token rejected".into()));
        }

        self.shared.connected.store(true, Ordering::SeqCst);
        debug!(bot = %self.bot.user_id, "Memory transport connected");
        Ok(ConnectionHandle::new(self.bot.clone()))
    }

    async fn receive(&self) -> TransportResult<Option<RawEvent>> {
        let mut inbound = self.inbound.lock().await;
        let item = inbound.recv().await;

        match item {
            Some(Inbound::Event(raw)) => {
                self.shared.delivered.fetch_add(1, Ordering::SeqCst);
                trace!(%raw, "Delivering raw event");
                Ok(Some(raw))
            }
            Some(Inbound::Error(err)) => {
                self.shared.delivered.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
            Some(Inbound::End) | None => Ok(None),
        }
    }

    async fn send(&self, channel: &str, message: OutgoingMessage) -> SendResult<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SendError::NotConnected);
        }

        self.outbound
            .send(SentMessage {
                channel: channel.to_string(),
                message,
            })
            .map_err(|_| SendError::Failed("remote end dropped".into()))
    }

    async fn close(&self) {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.closed.store(true, Ordering::SeqCst);
        debug!(bot = %self.bot.user_id, "Memory transport closed");
    }
}

impl MemoryHandle {
    /// Queues a raw event.
    pub fn push(&self, raw: RawEvent) {
        let _ = self.inbound.send(Inbound::Event(raw));
    }

    /// Queues a JSON payload.
    pub fn push_json(&self, value: Value) {
        self.push(RawEvent::new(value));
    }

    /// Queues a receive failure.
    pub fn push_error(&self, err: TransportError) {
        let _ = self.inbound.send(Inbound::Error(err));
    }

    /// Ends the event stream; the next receive after queued items returns `None`.
    pub fn end(&self) {
        let _ = self.inbound.send(Inbound::End);
    }

    /// Waits for the next message the bot sends.
    pub async fn next_sent(&self) -> Option<SentMessage> {
        self.outbound.lock().await.recv().await
    }

    /// Returns an already-sent message without waiting.
    pub async fn try_next_sent(&self) -> Option<SentMessage> {
        self.outbound.lock().await.try_recv().ok()
    }

    /// Number of events and errors handed to the dispatcher so far.
    pub fn delivered(&self) -> usize {
        self.shared.delivered.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// How many times `close` was called.
    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair() -> (MemoryTransport, MemoryHandle) {
        MemoryTransport::pair(BotIdentity::new("UBOT"))
    }

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let (transport, handle) = pair();
        handle.push_json(json!({"type": "hello"}));
        handle.push_error(TransportError::protocol("boom"));
        handle.end();

        let first = transport.receive().await.unwrap().unwrap();
        assert_eq!(first.event_type(), Some("hello"));
        assert!(transport.receive().await.is_err());
        assert!(transport.receive().await.unwrap().is_none());
        assert_eq!(handle.delivered(), 2);
    }

    #[tokio::test]
    async fn test_required_token() {
        let (transport, handle) = pair();
        let transport = transport.require_token("xoxb-good");

        assert!(transport.connect(&Credentials::new("bad")).await.is_err());
        assert!(!handle.is_connected());

        let conn = transport.connect(&Credentials::new("xoxb-good")).await.unwrap();
        assert_eq!(conn.bot.user_id, "UBOT");
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (transport, handle) = pair();
        transport.send("C1", "hi".into()).await.unwrap();
        assert_eq!(handle.next_sent().await.unwrap().channel, "C1");

        transport.close().await;
        assert!(matches!(
            transport.send("C1", "again".into()).await,
            Err(SendError::NotConnected)
        ));
        assert_eq!(handle.close_calls(), 1);
    }
}
