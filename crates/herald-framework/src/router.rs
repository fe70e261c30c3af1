//! Command routing.
//!
//! The [`CommandRouter`] takes an eligible message, strips a leading mention,
//! and walks the registry in order. The first matcher that accepts the text
//! wins and its handler runs; later matchers are not consulted. When nothing
//! matches, the fallback handler (if configured) runs once with the full,
//! unstripped text.
//!
//! Handlers run under [`run_guarded`], so a panic becomes a
//! [`HandlerOutcome::Failure`] instead of unwinding into the caller. A
//! successful outcome carrying a [`Reply`](crate::handler::Reply) is delivered
//! to the originating channel.

use std::future::Future;
use std::sync::Arc;

use tracing::{Instrument, debug, debug_span, warn};

use crate::command::{CommandArgs, CommandDefinition};
use crate::context::DispatchContext;
use crate::filter::{Eligibility, strip_mention};
use crate::handler::{BoxedHandler, HandlerOutcome, IntoOutcome, into_handler, run_guarded};
use crate::registry::CommandRegistry;

/// What routing one message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResult {
    /// A registered command matched and ran.
    Matched {
        /// Position of the command in registration order.
        index: usize,
        usage: String,
        outcome: HandlerOutcome,
    },
    /// No command matched; the fallback ran.
    Fallback(HandlerOutcome),
    /// Nothing ran.
    NoMatch,
}

impl RouteResult {
    pub fn outcome(&self) -> Option<&HandlerOutcome> {
        match self {
            Self::Matched { outcome, .. } | Self::Fallback(outcome) => Some(outcome),
            Self::NoMatch => None,
        }
    }
}

/// Routes eligible messages to the first matching command.
#[derive(Clone)]
pub struct CommandRouter {
    registry: Arc<CommandRegistry>,
    fallback: Option<BoxedHandler>,
}

impl CommandRouter {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            fallback: None,
        }
    }

    /// Sets the handler invoked when no command matches.
    pub fn with_fallback(mut self, handler: BoxedHandler) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Sets the fallback from an async function.
    pub fn fallback<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.with_fallback(into_handler(handler))
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Finds the first command accepting `text`, in registration order.
    pub fn select(&self, text: &str) -> Option<(usize, Arc<CommandDefinition>, CommandArgs)> {
        let snapshot = self.registry.snapshot();
        snapshot.iter().enumerate().find_map(|(index, command)| {
            command
                .matcher()
                .matches(text)
                .map(|args| (index, Arc::clone(command), args))
        })
    }

    /// Routes the message carried by `ctx`.
    ///
    /// Messages that are not routable, or contexts without a message, yield
    /// [`RouteResult::NoMatch`] without running anything.
    pub async fn route(&self, ctx: DispatchContext, eligibility: Eligibility) -> RouteResult {
        if !eligibility.is_routable() {
            return RouteResult::NoMatch;
        }
        let Some(full_text) = ctx.text().map(str::to_owned) else {
            return RouteResult::NoMatch;
        };

        let text = match eligibility {
            Eligibility::Mentioned => strip_mention(&full_text, ctx.bot()),
            _ => full_text.as_str(),
        };

        if let Some((index, command, args)) = self.select(text) {
            let usage = command.usage();
            debug!(command = %usage, index, "Command matched");

            let handler_ctx = ctx.clone();
            let outcome = run_guarded(async move { command.handler().call(handler_ctx, args).await })
                .instrument(debug_span!("command", usage = %usage))
                .await;
            deliver(&ctx, &outcome, &usage).await;
            return RouteResult::Matched {
                index,
                usage,
                outcome,
            };
        }

        let Some(fallback) = &self.fallback else {
            debug!(text, "No command matched");
            return RouteResult::NoMatch;
        };

        debug!("No command matched, running fallback");
        let args = CommandArgs::from_text(&full_text);
        let handler_ctx = ctx.clone();
        let outcome = run_guarded(async move { fallback.call(handler_ctx, args).await })
            .instrument(debug_span!("fallback"))
            .await;
        deliver(&ctx, &outcome, "fallback").await;
        RouteResult::Fallback(outcome)
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("registry", &self.registry)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

async fn deliver(ctx: &DispatchContext, outcome: &HandlerOutcome, usage: &str) {
    match outcome {
        HandlerOutcome::Success(Some(reply)) => {
            if let Err(e) = ctx.send_reply(reply.clone()).await {
                warn!(command = usage, error = %e, "Failed to send reply");
            }
        }
        HandlerOutcome::Success(None) => {}
        HandlerOutcome::Failure(reason) => {
            warn!(command = usage, reason = %reason, "Handler failed");
        }
    }
}
