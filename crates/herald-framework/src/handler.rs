//! Handler system for the Herald framework.
//!
//! Command handlers are plain async functions or closures taking a
//! [`DispatchContext`] and the matcher's [`CommandArgs`]. Whatever they return
//! is turned into a [`HandlerOutcome`] through [`IntoOutcome`]:
//!
//! ```rust,ignore
//! // No reply
//! async fn audit(ctx: DispatchContext, _args: CommandArgs) {
//!     tracing::info!(sender = ?ctx.sender(), "audited");
//! }
//!
//! // Reply with text
//! async fn ping(_ctx: DispatchContext, _args: CommandArgs) -> &'static str {
//!     "pong"
//! }
//!
//! // Fallible; errors become HandlerOutcome::Failure
//! async fn deploy(_ctx: DispatchContext, args: CommandArgs) -> anyhow::Result<String> {
//!     let env = args.get("env").context("missing env")?;
//!     Ok(format!("deploying to {env}"))
//! }
//! ```
//!
//! Lifecycle, error and fallback-event callbacks follow the same shape with a
//! different second argument; see [`BoxedCallback`].

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;

use herald_core::ReplyOptions;

use crate::command::CommandArgs;
use crate::context::DispatchContext;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Outcomes
// ============================================================================

/// A reply a handler asks the dispatcher to send to the originating channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub options: ReplyOptions,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: ReplyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReplyOptions) -> Self {
        self.options = options;
        self
    }
}

/// What running a handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The handler finished, optionally with a reply to send.
    Success(Option<Reply>),
    /// The handler failed.
    Failure(String),
}

impl HandlerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The reply carried by a successful outcome.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Success(reply) => reply.as_ref(),
            Self::Failure(_) => None,
        }
    }
}

/// Conversion from a handler's return value into a [`HandlerOutcome`].
pub trait IntoOutcome {
    fn into_outcome(self) -> HandlerOutcome;
}

impl IntoOutcome for HandlerOutcome {
    fn into_outcome(self) -> HandlerOutcome {
        self
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> HandlerOutcome {
        HandlerOutcome::Success(None)
    }
}

impl IntoOutcome for Reply {
    fn into_outcome(self) -> HandlerOutcome {
        HandlerOutcome::Success(Some(self))
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> HandlerOutcome {
        HandlerOutcome::Success(Some(Reply::text(self)))
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> HandlerOutcome {
        HandlerOutcome::Success(Some(Reply::text(self)))
    }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> HandlerOutcome {
        self.map_or(HandlerOutcome::Success(None), IntoOutcome::into_outcome)
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Display,
{
    fn into_outcome(self) -> HandlerOutcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(err) => HandlerOutcome::Failure(err.to_string()),
        }
    }
}

/// Awaits a handler future, turning a panic into [`HandlerOutcome::Failure`].
pub async fn run_guarded<Fut>(fut: Fut) -> HandlerOutcome
where
    Fut: Future<Output = HandlerOutcome>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            HandlerOutcome::Failure(format!("handler panicked: {}", panic_message(&*panic)))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

// ============================================================================
// Command Handlers
// ============================================================================

/// Type-erased command handler trait for dynamic dispatch.
pub trait CommandHandler: Send + Sync {
    /// Runs the handler.
    fn call(&self, ctx: DispatchContext, args: CommandArgs) -> BoxFuture<'static, HandlerOutcome>;
}

/// A type-erased command handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn CommandHandler>;

/// Wraps an async function so it can be stored as a [`BoxedHandler`].
pub struct HandlerFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> HandlerFn<F, Fut> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, Fut> CommandHandler for HandlerFn<F, Fut>
where
    F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
{
    fn call(&self, ctx: DispatchContext, args: CommandArgs) -> BoxFuture<'static, HandlerOutcome> {
        let fut = (self.f)(ctx, args);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

/// Converts an async function into a boxed command handler.
pub fn into_handler<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
{
    Arc::new(HandlerFn::new(f))
}

// ============================================================================
// Callbacks
// ============================================================================

/// A type-erased callback receiving the context and an event-specific value.
///
/// - init callbacks: `BoxedCallback<()>`
/// - error callbacks: `BoxedCallback<String>`
/// - fallback-event callbacks: `BoxedCallback<RawEvent>`
pub type BoxedCallback<A> =
    Arc<dyn Fn(DispatchContext, A) -> BoxFuture<'static, HandlerOutcome> + Send + Sync>;

/// Boxes a two-argument async callback.
pub fn into_callback<A, F, Fut>(f: F) -> BoxedCallback<A>
where
    A: Send + 'static,
    F: Fn(DispatchContext, A) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
{
    Arc::new(move |ctx: DispatchContext, value: A| -> BoxFuture<'static, HandlerOutcome> {
        let fut = f(ctx, value);
        Box::pin(async move { fut.await.into_outcome() })
    })
}

/// Boxes a context-only async callback, such as an init callback.
pub fn into_unit_callback<F, Fut>(f: F) -> BoxedCallback<()>
where
    F: Fn(DispatchContext) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
{
    into_callback(move |ctx: DispatchContext, (): ()| f(ctx))
}
