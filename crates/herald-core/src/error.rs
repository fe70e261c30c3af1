//! Error types shared by the transport boundary.
//!
//! Dispatch-level and configuration errors live in `herald-runtime`; the
//! registry error lives in `herald-framework`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Recoverable failures reported by a transport while receiving events.
///
/// The dispatch loop hands these to the registered error callback and keeps
/// consuming events. Reconnecting is the transport's own business.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection dropped or could not be read from.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Reason reported by the transport.
        reason: String,
    },

    /// An error frame delivered by the remote end.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Creates a connection-lost error.
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Authentication Errors
// =============================================================================

/// Errors returned by [`Transport::connect`](crate::Transport::connect).
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The remote end rejected the credentials.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The connection could not be established at all.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

// =============================================================================
// Send Errors
// =============================================================================

/// Errors that can occur when sending a message through the transport.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The transport is closed or was never connected.
    #[error("transport is not connected")]
    NotConnected,

    /// A reply was requested for an event that has no originating channel.
    #[error("no channel to reply to")]
    NoChannel,

    /// The transport refused or failed to deliver the message.
    #[error("failed to send message: {0}")]
    Failed(String),
}

impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Failed(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for receive operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for send operations.
pub type SendResult<T> = Result<T, SendError>;
