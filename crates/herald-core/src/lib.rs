//! # Herald Core
//!
//! The foundation types of the Herald command dispatcher.
//!
//! - **Events**: the raw payload a transport yields ([`RawEvent`]) and the
//!   closed set of kinds the dispatcher acts on ([`InboundEvent`])
//! - **Classification**: [`classify`], a total function from one to the other
//! - **Transport**: the [`Transport`] collaborator trait the dispatcher drives
//! - **Messages**: outgoing content and per-reply [`ReplyOptions`]
//!
//! ```text
//! ┌───────────┐  RawEvent  ┌──────────┐  InboundEvent  ┌────────────┐
//! │ Transport │───────────▶│ classify │───────────────▶│ Dispatcher │
//! └───────────┘            └──────────┘                └────────────┘
//! ```

pub mod classify;
pub mod error;
pub mod event;
pub mod message;
pub mod transport;

pub use classify::classify;
pub use error::{AuthError, SendError, SendResult, TransportError, TransportResult};
pub use event::{BotIdentity, ChannelKind, InboundEvent, MessageEvent, RawEvent};
pub use message::{Attachment, AttachmentField, Block, OutgoingMessage, ReplyOptions};
pub use transport::{BoxedTransport, ConnectionHandle, Credentials, Transport};
