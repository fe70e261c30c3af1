//! Event types flowing from the transport into the dispatcher.
//!
//! - [`RawEvent`] - the untyped payload a transport yields per receive call
//! - [`InboundEvent`] - the closed set of event kinds the dispatcher acts on
//! - [`MessageEvent`] - the data carried by an incoming chat message
//! - [`BotIdentity`] - who the bot itself is on the connection

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Raw Events
// ============================================================================

/// An unparsed event payload as delivered by a transport.
///
/// The dispatcher never rejects a raw event: anything it cannot make sense
/// of is classified as [`InboundEvent::Unrecognized`] and handed back intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Value);

impl RawEvent {
    /// Wraps a JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parses a JSON string.
    ///
    /// Input that is not valid JSON is kept verbatim as a JSON string value.
    pub fn from_json(input: &str) -> Self {
        match serde_json::from_str(input) {
            Ok(value) => Self(value),
            Err(_) => Self(Value::String(input.to_string())),
        }
    }

    /// Returns the underlying payload.
    pub fn payload(&self) -> &Value {
        &self.0
    }

    /// Consumes the event and returns the payload.
    pub fn into_payload(self) -> Value {
        self.0
    }

    /// Returns the `"type"` field, if the payload is an object carrying one.
    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }
}

impl From<Value> for RawEvent {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Bot Identity
// ============================================================================

/// The identity the bot holds on the chat connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotIdentity {
    /// The protocol-level user ID of the bot.
    pub user_id: String,
    /// Display name, if the transport reports one.
    #[serde(default)]
    pub name: Option<String>,
}

impl BotIdentity {
    /// Creates an identity from a user ID.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The token that appears in message text when someone mentions the bot.
    pub fn mention_token(&self) -> String {
        format!("<@{}>", self.user_id)
    }
}

// ============================================================================
// Incoming Messages
// ============================================================================

/// Where a message was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A one-to-one conversation with the bot.
    Direct,
    /// A shared channel or group conversation.
    Channel,
}

/// An incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// User ID of the author.
    pub sender: String,
    /// Channel the message was posted in.
    pub channel: String,
    /// Raw message text, mention tokens included.
    pub text: String,
    /// Protocol timestamp of the message, if present.
    pub timestamp: Option<String>,
    /// Whether this is a direct conversation.
    pub kind: ChannelKind,
}

impl MessageEvent {
    /// Returns `true` if the message was posted in a direct conversation.
    pub fn is_direct(&self) -> bool {
        self.kind == ChannelKind::Direct
    }
}

// ============================================================================
// Inbound Events
// ============================================================================

/// The closed set of events the dispatcher distinguishes.
///
/// Produced by [`classify`](crate::classify::classify); every raw payload maps
/// to exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The connection is up and the remote end greeted us.
    ConnectionEstablished,
    /// A chat message.
    Message(MessageEvent),
    /// A recoverable transport or protocol error.
    TransportError {
        /// Human-readable description.
        message: String,
    },
    /// The remote end rejected our credentials. Fatal.
    AuthInvalid,
    /// A payload that did not match any known shape.
    Unrecognized(RawEvent),
}

impl InboundEvent {
    /// Short static label for log fields.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished => "connection_established",
            Self::Message(_) => "message",
            Self::TransportError { .. } => "transport_error",
            Self::AuthInvalid => "auth_invalid",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}
