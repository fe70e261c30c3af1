//! The transport collaborator boundary.
//!
//! A [`Transport`] owns the real connection: sockets, reconnects, heartbeats
//! and wire marshaling. The dispatcher only ever calls the four operations
//! below.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, SendResult, TransportResult};
use crate::event::{BotIdentity, RawEvent};
use crate::message::OutgoingMessage;

/// Credentials presented to the transport when connecting.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bot token.
    #[serde(default)]
    pub token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// What a successful [`Transport::connect`] hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// The bot's own identity on this connection.
    pub bot: BotIdentity,
}

impl ConnectionHandle {
    pub fn new(bot: BotIdentity) -> Self {
        Self { bot }
    }
}

/// A real-time chat connection.
///
/// All methods take `&self`: the dispatch loop receives while detached
/// handlers send concurrently through the same `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the connection and authenticates.
    async fn connect(&self, credentials: &Credentials) -> Result<ConnectionHandle, AuthError>;

    /// Waits for the next raw event.
    ///
    /// Returns `Ok(None)` once the event stream has ended for good.
    async fn receive(&self) -> TransportResult<Option<RawEvent>>;

    /// Sends a message to a channel.
    async fn send(&self, channel: &str, message: OutgoingMessage) -> SendResult<()>;

    /// Closes the connection. Called exactly once when the loop stops.
    async fn close(&self);
}

/// Shared transport handle.
pub type BoxedTransport = Arc<dyn Transport>;
