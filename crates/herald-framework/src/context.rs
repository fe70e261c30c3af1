//! Context handed to handlers and callbacks.
//!
//! Two layers, in the same spirit as a shared base plus per-call data:
//!
//! - [`Session`]: **shared** for the lifetime of one dispatch loop. Holds the
//!   bot identity, the transport used for replies, and the loop's
//!   cancellation token.
//! - [`DispatchContext`]: created fresh per event. Wraps an `Arc<Session>`
//!   and, for message events, the originating [`MessageEvent`].

use std::fmt::{self, Display};
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use herald_core::{
    BotIdentity, BoxedTransport, MessageEvent, OutgoingMessage, ReplyOptions, SendError,
    SendResult,
};

use crate::handler::Reply;

// =============================================================================
// Session (shared, one per dispatch loop)
// =============================================================================

/// State shared by every context created during one run of the dispatch loop.
pub struct Session {
    bot: BotIdentity,
    transport: BoxedTransport,
    cancellation: CancellationToken,
}

impl Session {
    pub fn new(bot: BotIdentity, transport: BoxedTransport, cancellation: CancellationToken) -> Self {
        Self {
            bot,
            transport,
            cancellation,
        }
    }

    pub fn bot(&self) -> &BotIdentity {
        &self.bot
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("bot", &self.bot)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// DispatchContext (per event)
// =============================================================================

/// The context passed to every handler invocation.
///
/// Cloning is cheap: both layers are reference counted.
///
/// # Example
///
/// ```rust,ignore
/// async fn deploy(ctx: DispatchContext, args: CommandArgs) -> SendResult<()> {
///     ctx.reply("starting deploy").await?;
///     tokio::select! {
///         _ = ctx.cancelled() => return Ok(()),
///         _ = run_deploy(args.get("env")) => {}
///     }
///     ctx.reply("done").await
/// }
/// ```
#[derive(Clone)]
pub struct DispatchContext {
    session: Arc<Session>,
    origin: Option<Arc<MessageEvent>>,
}

impl DispatchContext {
    /// A context that is not tied to a message (lifecycle, errors, raw events).
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            origin: None,
        }
    }

    /// A context for a message event.
    pub fn for_message(session: Arc<Session>, message: MessageEvent) -> Self {
        Self {
            session,
            origin: Some(Arc::new(message)),
        }
    }

    // ─── Session delegation ───────────────────────────────────────────────────

    /// The bot's own identity.
    pub fn bot(&self) -> &BotIdentity {
        &self.session.bot
    }

    /// The dispatch loop's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.session.cancellation
    }

    /// Returns `true` once the dispatch loop has been told to stop.
    pub fn is_cancelled(&self) -> bool {
        self.session.cancellation.is_cancelled()
    }

    /// Resolves when the dispatch loop is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.session.cancellation.cancelled()
    }

    // ─── Originating message ──────────────────────────────────────────────────

    /// The message this context was created for, if any.
    pub fn message(&self) -> Option<&MessageEvent> {
        self.origin.as_deref()
    }

    pub fn sender(&self) -> Option<&str> {
        self.origin.as_ref().map(|m| m.sender.as_str())
    }

    pub fn channel(&self) -> Option<&str> {
        self.origin.as_ref().map(|m| m.channel.as_str())
    }

    /// The full, unstripped message text.
    pub fn text(&self) -> Option<&str> {
        self.origin.as_ref().map(|m| m.text.as_str())
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.origin.as_ref().and_then(|m| m.timestamp.as_deref())
    }

    pub fn is_direct(&self) -> bool {
        self.origin.as_ref().is_some_and(|m| m.is_direct())
    }

    // ─── Replying ─────────────────────────────────────────────────────────────

    /// Replies to the originating channel with plain text.
    pub async fn reply(&self, text: impl Into<String>) -> SendResult<()> {
        self.reply_with(text, ReplyOptions::default()).await
    }

    /// Replies to the originating channel with rich content.
    pub async fn reply_with(&self, text: impl Into<String>, options: ReplyOptions) -> SendResult<()> {
        let channel = self.channel().ok_or(SendError::NoChannel)?;
        self.send(channel, options.into_message(text)).await
    }

    /// Replies with a formatted error report.
    pub async fn report_error(&self, err: impl Display) -> SendResult<()> {
        self.reply(format!("*Error:* {err}")).await
    }

    /// Sends a handler's [`Reply`] to the originating channel.
    pub async fn send_reply(&self, reply: Reply) -> SendResult<()> {
        self.reply_with(reply.text, reply.options).await
    }

    /// Sends a message to an arbitrary channel.
    pub async fn send(&self, channel: &str, message: impl Into<OutgoingMessage>) -> SendResult<()> {
        debug!(channel, "Sending message");
        self.session.transport.send(channel, message.into()).await
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("session", &self.session)
            .field("origin", &self.origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Attachment, Block, ChannelKind};
    use herald_transport::{MemoryHandle, MemoryTransport};

    fn session() -> (Arc<Session>, MemoryHandle) {
        let bot = BotIdentity::new("UBOT");
        let (transport, handle) = MemoryTransport::pair(bot.clone());
        let session = Session::new(bot, Arc::new(transport), CancellationToken::new());
        (Arc::new(session), handle)
    }

    fn message(channel: &str) -> MessageEvent {
        MessageEvent {
            sender: "U1".into(),
            channel: channel.into(),
            text: "status".into(),
            timestamp: Some("1.0".into()),
            kind: ChannelKind::Channel,
        }
    }

    #[tokio::test]
    async fn test_reply_goes_to_origin_channel() {
        let (session, handle) = session();
        let ctx = DispatchContext::for_message(session, message("C9"));

        ctx.reply("ok").await.unwrap();
        let sent = handle.next_sent().await.unwrap();
        assert_eq!(sent.channel, "C9");
        assert_eq!(sent.message.text, "ok");
    }

    #[tokio::test]
    async fn test_reply_with_options() {
        let (session, handle) = session();
        let ctx = DispatchContext::for_message(session, message("C9"));

        let options = ReplyOptions::new()
            .attachment(Attachment::new("details").color("good"))
            .block(Block::Divider);
        ctx.reply_with("report", options).await.unwrap();

        let sent = handle.next_sent().await.unwrap();
        assert_eq!(sent.message.attachments.len(), 1);
        assert_eq!(sent.message.blocks, vec![Block::Divider]);
    }

    #[tokio::test]
    async fn test_report_error_format() {
        let (session, handle) = session();
        let ctx = DispatchContext::for_message(session, message("C9"));

        ctx.report_error("disk full").await.unwrap();
        assert_eq!(handle.next_sent().await.unwrap().message.text, "*Error:* disk full");
    }

    #[tokio::test]
    async fn test_reply_without_origin_fails() {
        let (session, _handle) = session();
        let ctx = DispatchContext::new(session);

        assert!(ctx.sender().is_none());
        assert!(matches!(ctx.reply("hi").await, Err(SendError::NoChannel)));
    }

    #[tokio::test]
    async fn test_cancellation_is_shared() {
        let (session, _handle) = session();
        let a = DispatchContext::new(Arc::clone(&session));
        let b = DispatchContext::for_message(session, message("C1"));

        assert!(!b.is_cancelled());
        a.cancellation().cancel();
        assert!(b.is_cancelled());
        b.cancelled().await;
    }
}
