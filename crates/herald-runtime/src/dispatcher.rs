//! The dispatch loop.
//!
//! A [`Dispatcher`] owns one transport connection. [`Dispatcher::run`]
//! connects, then pulls raw events one at a time, classifies each and hands
//! it off:
//!
//! | event                   | action                                         |
//! |-------------------------|------------------------------------------------|
//! | `ConnectionEstablished` | init callback                                  |
//! | `Message`               | filter, then the command router if eligible    |
//! | `TransportError`        | error callback; the loop continues             |
//! | `AuthInvalid`           | stop; `run` returns [`DispatchError::InvalidAuth`] |
//! | `Unrecognized`          | fallback-event callback, if any                |
//!
//! Every handler and callback runs in its own `tokio::spawn`ed task whose
//! handle is dropped, so the loop never waits on one. Stopping cancels the
//! loop's [`CancellationToken`]; in-flight handlers see it through
//! [`DispatchContext::cancelled`] and are never joined.
//!
//! ```text
//!        run()           AuthInvalid / stop() / stream end
//! Idle ────────▶ Running ─────────────────────────────────▶ Stopping ──close()──▶ Stopped
//! ```
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder(Arc::new(transport))
//!     .credentials(Credentials::new(token))
//!     .command("ping", |_ctx, _args| async { "pong" })?
//!     .on_error(|_ctx, message| async move { tracing::warn!(%message, "transport error") })
//!     .build();
//!
//! dispatcher.run_until_signal().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, error, info, trace, warn};

use herald_core::{BoxedTransport, Credentials, InboundEvent, MessageEvent, RawEvent, classify};
use herald_framework::{
    BoxedCallback, BoxedHandler, CommandArgs, CommandRegistry, CommandRouter, DispatchContext,
    HandlerOutcome, IntoOutcome, RegistryResult, RouteResult, Session, eligibility,
    help_command, into_callback, into_handler, into_unit_callback, run_guarded,
};

use crate::config::{DispatcherConfig, HeraldConfig};
use crate::error::{DispatchError, DispatchResult};

/// Per-event diagnostics: `info` in debug mode, `debug` otherwise.
macro_rules! event_log {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Lifecycle state of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Why a loop that ran without a fatal error stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled.
    Cancelled,
    /// The transport reported the end of its event stream.
    StreamEnded,
}

/// What to do after handing off one event.
enum Flow {
    Continue,
    Fatal,
}

#[derive(Default, Clone)]
struct Callbacks {
    init: Option<BoxedCallback<()>>,
    error: Option<BoxedCallback<String>>,
    unrecognized: Option<BoxedCallback<RawEvent>>,
}

/// Drives one transport connection through the dispatch loop.
pub struct Dispatcher {
    transport: BoxedTransport,
    credentials: Credentials,
    config: DispatcherConfig,
    registry: Arc<CommandRegistry>,
    fallback: Option<BoxedHandler>,
    callbacks: Callbacks,
    cancellation: CancellationToken,
    state: watch::Sender<LoopState>,
    started: AtomicBool,
}

impl Dispatcher {
    pub fn builder(transport: BoxedTransport) -> DispatcherBuilder {
        DispatcherBuilder::new(transport)
    }

    /// The registry commands are routed against. Appending to it while the
    /// loop runs is allowed.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// The loop's cancellation token. Cancelling it stops the loop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Asks the loop to stop. In-flight handlers are signalled, not awaited.
    pub fn stop(&self) {
        info!("Stop requested");
        self.cancellation.cancel();
    }

    fn set_state(&self, state: LoopState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Dispatcher state changed");
        }
    }

    /// Connects and runs the loop until it stops.
    ///
    /// Returns `Ok` when the loop was cancelled or the event stream ended,
    /// and an error when authentication is rejected or connecting fails. A
    /// dispatcher runs at most once.
    pub async fn run(&self) -> DispatchResult<StopReason> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::AlreadyStarted);
        }

        if self.config.help_command {
            self.registry.register(help_command(&self.registry))?;
        }

        let bot = match self.transport.connect(&self.credentials).await {
            Ok(handle) => handle.bot,
            Err(e) => {
                error!(error = %e, "Failed to connect");
                self.set_state(LoopState::Stopped);
                return Err(DispatchError::Connect(e));
            }
        };

        info!(
            bot = %bot.user_id,
            commands = self.registry.len(),
            "Dispatcher running"
        );
        self.set_state(LoopState::Running);

        let session = Arc::new(Session::new(
            bot,
            Arc::clone(&self.transport),
            self.cancellation.clone(),
        ));
        let mut router = CommandRouter::new(Arc::clone(&self.registry));
        if let Some(fallback) = &self.fallback {
            router = router.with_fallback(Arc::clone(fallback));
        }
        let router = Arc::new(router);

        let result = self.consume(&session, &router).await;

        self.set_state(LoopState::Stopping);
        self.cancellation.cancel();
        self.transport.close().await;
        self.set_state(LoopState::Stopped);

        match &result {
            Ok(reason) => info!(reason = ?reason, "Dispatcher stopped"),
            Err(e) => error!(error = %e, "Dispatcher stopped"),
        }
        result
    }

    /// Connects and runs until Ctrl+C or SIGTERM.
    pub async fn run_until_signal(&self) -> DispatchResult<StopReason> {
        let token = self.shutdown_token();
        let watcher = tokio::spawn(async move {
            wait_for_shutdown().await;
            token.cancel();
        });

        let result = self.run().await;
        watcher.abort();
        result
    }

    async fn consume(
        &self,
        session: &Arc<Session>,
        router: &Arc<CommandRouter>,
    ) -> DispatchResult<StopReason> {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => return Ok(StopReason::Cancelled),
                received = self.transport.receive() => received,
            };

            match received {
                Ok(Some(raw)) => {
                    let event = classify(raw);
                    let span = debug_span!("dispatch", kind = event.kind_name());
                    let flow = span.in_scope(|| self.dispatch(event, session, router));
                    if let Flow::Fatal = flow {
                        return Err(DispatchError::InvalidAuth);
                    }
                }
                Ok(None) => {
                    info!("Event stream ended");
                    return Ok(StopReason::StreamEnded);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to receive event");
                    self.spawn_error(session, e.to_string());
                }
            }
        }
    }

    /// Hands one event off without waiting on any handler.
    fn dispatch(&self, event: InboundEvent, session: &Arc<Session>, router: &Arc<CommandRouter>) -> Flow {
        let verbose = self.config.debug;

        match event {
            InboundEvent::ConnectionEstablished => {
                event_log!(verbose, "Connection established");
                if let Some(init) = &self.callbacks.init {
                    spawn_callback("init", init, DispatchContext::new(Arc::clone(session)), ());
                }
            }
            InboundEvent::Message(message) => self.dispatch_message(message, session, router),
            InboundEvent::TransportError { message } => {
                event_log!(verbose, error = %message, "Transport error event");
                self.spawn_error(session, message);
            }
            InboundEvent::AuthInvalid => {
                error!("Authentication rejected, stopping");
                return Flow::Fatal;
            }
            InboundEvent::Unrecognized(raw) => match &self.callbacks.unrecognized {
                Some(callback) => {
                    event_log!(verbose, event_type = ?raw.event_type(), "Unrecognized event");
                    spawn_callback(
                        "unrecognized",
                        callback,
                        DispatchContext::new(Arc::clone(session)),
                        raw,
                    );
                }
                None => trace!(event_type = ?raw.event_type(), "Dropping unrecognized event"),
            },
        }
        Flow::Continue
    }

    fn dispatch_message(&self, message: MessageEvent, session: &Arc<Session>, router: &Arc<CommandRouter>) {
        let verdict = eligibility(&message, session.bot());
        event_log!(
            self.config.debug,
            sender = %message.sender,
            channel = %message.channel,
            eligibility = ?verdict,
            "Message received"
        );
        if !verdict.is_routable() {
            return;
        }

        let ctx = DispatchContext::for_message(Arc::clone(session), message);
        let router = Arc::clone(router);
        let verbose = self.config.debug;
        tokio::spawn(
            async move {
                match router.route(ctx, verdict).await {
                    RouteResult::Matched { usage, outcome, .. } => {
                        event_log!(verbose, command = %usage, success = outcome.is_success(), "Command handled");
                    }
                    RouteResult::Fallback(outcome) => {
                        event_log!(verbose, success = outcome.is_success(), "Fallback handled");
                    }
                    RouteResult::NoMatch => {}
                }
            }
            .instrument(debug_span!("route")),
        );
    }

    fn spawn_error(&self, session: &Arc<Session>, message: String) {
        match &self.callbacks.error {
            Some(callback) => spawn_callback(
                "error",
                callback,
                DispatchContext::new(Arc::clone(session)),
                message,
            ),
            None => warn!(error = %message, "Transport error with no error callback"),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Runs a callback detached, logging a failure.
fn spawn_callback<A: Send + 'static>(
    name: &'static str,
    callback: &BoxedCallback<A>,
    ctx: DispatchContext,
    value: A,
) {
    let callback = Arc::clone(callback);
    tokio::spawn(
        async move {
            if let HandlerOutcome::Failure(reason) = run_guarded(async move { callback(ctx, value).await }).await {
                warn!(callback = name, reason = %reason, "Callback failed");
            }
        }
        .instrument(debug_span!("callback", name)),
    );
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// DispatcherBuilder
// =============================================================================

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    transport: BoxedTransport,
    credentials: Credentials,
    config: DispatcherConfig,
    registry: Arc<CommandRegistry>,
    fallback: Option<BoxedHandler>,
    callbacks: Callbacks,
    cancellation: CancellationToken,
}

impl DispatcherBuilder {
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            credentials: Credentials::default(),
            config: DispatcherConfig::default(),
            registry: Arc::new(CommandRegistry::new()),
            fallback: None,
            callbacks: Callbacks::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Applies credentials and dispatcher settings from a loaded configuration.
    pub fn with_config(mut self, config: &HeraldConfig) -> Self {
        self.credentials = config.credentials.clone();
        self.config = config.dispatcher.clone();
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an existing registry instead of a fresh one.
    pub fn registry(mut self, registry: Arc<CommandRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Uses `token` as the loop's shutdown token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Registers a command; see [`CommandRegistry::command`].
    pub fn command<F, Fut>(self, spec: &str, handler: F) -> RegistryResult<Self>
    where
        F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.registry.command(spec, handler)?;
        Ok(self)
    }

    /// Handler for eligible messages no command matches. It receives the
    /// full message text as [`CommandArgs::rest`].
    pub fn fallback<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(DispatchContext, CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.fallback = Some(into_handler(handler));
        self
    }

    /// Called for every connection-established event.
    pub fn on_init<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(DispatchContext) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.callbacks.init = Some(into_unit_callback(callback));
        self
    }

    /// Called with the description of every transport error.
    pub fn on_error<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(DispatchContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.callbacks.error = Some(into_callback(callback));
        self
    }

    /// Called with the raw payload of every unrecognized event.
    pub fn on_unrecognized<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(DispatchContext, RawEvent) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.callbacks.unrecognized = Some(into_callback(callback));
        self
    }

    pub fn build(self) -> Dispatcher {
        let (state, _) = watch::channel(LoopState::Idle);
        Dispatcher {
            transport: self.transport,
            credentials: self.credentials,
            config: self.config,
            registry: self.registry,
            fallback: self.fallback,
            callbacks: self.callbacks,
            cancellation: self.cancellation,
            state,
            started: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herald_core::{
        AuthError, BotIdentity, ConnectionHandle, Credentials, OutgoingMessage, RawEvent,
        SendResult, Transport, TransportError, TransportResult,
    };
    use herald_transport::{MemoryHandle, MemoryTransport};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn pair() -> (MemoryTransport, MemoryHandle) {
        MemoryTransport::pair(BotIdentity::new("UBOT"))
    }

    fn message(user: &str, channel: &str, text: &str) -> serde_json::Value {
        json!({"type": "message", "user": user, "channel": channel, "text": text, "ts": "1.0"})
    }

    fn start(dispatcher: Dispatcher) -> (Arc<Dispatcher>, JoinHandle<DispatchResult<StopReason>>) {
        let dispatcher = Arc::new(dispatcher);
        let runner = Arc::clone(&dispatcher);
        let task = tokio::spawn(async move { runner.run().await });
        (dispatcher, task)
    }

    async fn finish(task: JoinHandle<DispatchResult<StopReason>>) -> DispatchResult<StopReason> {
        timeout(WAIT, task).await.unwrap().unwrap()
    }

    async fn next_text(handle: &MemoryHandle) -> String {
        timeout(WAIT, handle.next_sent())
            .await
            .unwrap()
            .unwrap()
            .message
            .text
    }

    #[tokio::test]
    async fn test_command_reply_and_stream_end() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .build();
        let (dispatcher, task) = start(dispatcher);

        handle.push_json(message("U1", "D1", "ping"));
        assert_eq!(next_text(&handle).await, "pong");

        handle.end();
        assert_eq!(finish(task).await.unwrap(), StopReason::StreamEnded);
        assert_eq!(dispatcher.state(), LoopState::Stopped);
        assert_eq!(handle.close_calls(), 1);
        assert!(dispatcher.shutdown_token().is_cancelled());
    }

    /// Holds `close` until released, so the Stopping state can be observed.
    struct GatedClose {
        inner: MemoryTransport,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Transport for GatedClose {
        async fn connect(&self, credentials: &Credentials) -> Result<ConnectionHandle, AuthError> {
            self.inner.connect(credentials).await
        }

        async fn receive(&self) -> TransportResult<Option<RawEvent>> {
            self.inner.receive().await
        }

        async fn send(&self, channel: &str, message: OutgoingMessage) -> SendResult<()> {
            self.inner.send(channel, message).await
        }

        async fn close(&self) {
            self.release.notified().await;
            self.inner.close().await;
        }
    }

    #[tokio::test]
    async fn test_auth_invalid_stops_consumption() {
        let (transport, handle) = pair();
        let release = Arc::new(Notify::new());
        let gated = GatedClose {
            inner: transport,
            release: Arc::clone(&release),
        };
        let dispatcher = Dispatcher::builder(Arc::new(gated))
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .build();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let mut states = dispatcher.subscribe_state();
        tokio::spawn(async move {
            let mut last = *states.borrow_and_update();
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                if state != last {
                    last = state;
                    let _ = seen_tx.send(state);
                }
            }
        });

        handle.push_json(json!({"type": "invalid_auth"}));
        handle.push_json(message("U1", "D1", "ping"));
        handle.push_json(message("U1", "D1", "ping"));

        let (dispatcher, task) = start(dispatcher);

        let mut seen = Vec::new();
        while seen.last() != Some(&LoopState::Stopping) {
            seen.push(timeout(WAIT, seen_rx.recv()).await.unwrap().unwrap());
        }
        release.notify_one();

        assert!(matches!(finish(task).await, Err(DispatchError::InvalidAuth)));
        seen.push(timeout(WAIT, seen_rx.recv()).await.unwrap().unwrap());

        assert_eq!(seen.iter().filter(|s| **s == LoopState::Stopping).count(), 1);
        assert_eq!(seen.last(), Some(&LoopState::Stopped));
        assert_eq!(handle.delivered(), 1);
        assert_eq!(dispatcher.state(), LoopState::Stopped);
        assert_eq!(handle.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_stop_the_loop() {
        let (transport, handle) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .on_error(move |_ctx, message: String| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(message);
                }
            })
            .build();
        let (_dispatcher, task) = start(dispatcher);

        handle.push_json(json!({"type": "error", "error": {"code": 1, "msg": "rate limited"}}));
        handle.push_error(TransportError::protocol("bad frame"));
        handle.push_json(message("U1", "D1", "ping"));

        let mut errors = vec![
            timeout(WAIT, rx.recv()).await.unwrap().unwrap(),
            timeout(WAIT, rx.recv()).await.unwrap().unwrap(),
        ];
        errors.sort();
        assert_eq!(errors, ["protocol error: bad frame", "rate limited"]);
        assert_eq!(next_text(&handle).await, "pong");

        handle.end();
        assert_eq!(finish(task).await.unwrap(), StopReason::StreamEnded);
    }

    #[tokio::test]
    async fn test_stuck_handler_does_not_delay_next_event() {
        let (transport, handle) = pair();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .command("hang", |_ctx, _args| futures::future::pending::<()>())
            .unwrap()
            .command("wait", move |ctx: DispatchContext, _args| {
                let done_tx = done_tx.clone();
                async move {
                    ctx.cancelled().await;
                    let _ = done_tx.send(());
                }
            })
            .unwrap()
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .build();
        let (dispatcher, task) = start(dispatcher);

        handle.push_json(message("U1", "D1", "hang"));
        handle.push_json(message("U1", "D1", "wait"));
        handle.push_json(message("U1", "D1", "ping"));
        assert_eq!(next_text(&handle).await, "pong");

        dispatcher.stop();
        assert_eq!(finish(task).await.unwrap(), StopReason::Cancelled);
        timeout(WAIT, done_rx.recv()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ignored_messages_and_fallback() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .fallback(|_ctx, args: CommandArgs| async move {
                format!("unknown: {}", args.rest().unwrap_or_default())
            })
            .build();
        let (_dispatcher, task) = start(dispatcher);

        handle.push_json(message("UBOT", "D1", "ping"));
        handle.push_json(message("U1", "C1", "ping"));
        handle.push_json(message("U1", "C1", "<@UBOT> dance"));
        assert_eq!(next_text(&handle).await, "unknown: <@UBOT> dance");

        handle.push_json(message("U1", "C1", "<@UBOT> ping"));
        assert_eq!(next_text(&handle).await, "pong");

        handle.end();
        finish(task).await.unwrap();
        assert!(handle.try_next_sent().await.is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_and_unrecognized_callbacks() {
        let (transport, handle) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let init_tx = tx.clone();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .on_init(move |ctx: DispatchContext| {
                let tx = init_tx.clone();
                async move {
                    let _ = tx.send(format!("init {}", ctx.bot().user_id));
                }
            })
            .on_unrecognized(move |_ctx, raw: RawEvent| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(format!("raw {}", raw.event_type().unwrap_or("?")));
                }
            })
            .build();
        let (_dispatcher, task) = start(dispatcher);

        handle.push_json(json!({"type": "hello"}));
        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), "init UBOT");

        handle.push_json(json!({"type": "reaction_added"}));
        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), "raw reaction_added");

        handle.end();
        finish(task).await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_callback_is_contained() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .on_init(|_ctx: DispatchContext| async {
                if true {
                    panic!("init exploded");
                }
            })
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .build();
        let (_dispatcher, task) = start(dispatcher);

        handle.push_json(json!({"type": "hello"}));
        handle.push_json(message("U1", "D1", "ping"));
        assert_eq!(next_text(&handle).await, "pong");

        handle.end();
        finish(task).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport.require_token("xoxb-good")))
            .credentials(Credentials::new("xoxb-bad"))
            .build();

        assert!(matches!(dispatcher.run().await, Err(DispatchError::Connect(_))));
        assert_eq!(dispatcher.state(), LoopState::Stopped);
        assert_eq!(handle.delivered(), 0);
    }

    #[tokio::test]
    async fn test_runs_only_once() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport)).build();

        handle.end();
        assert_eq!(dispatcher.run().await.unwrap(), StopReason::StreamEnded);
        assert!(matches!(dispatcher.run().await, Err(DispatchError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport)).build();
        let mut state = dispatcher.subscribe_state();
        assert_eq!(dispatcher.state(), LoopState::Idle);

        let (dispatcher, task) = start(dispatcher);
        timeout(WAIT, state.wait_for(|s| *s == LoopState::Running))
            .await
            .unwrap()
            .unwrap();

        dispatcher.shutdown_token().cancel();
        assert_eq!(finish(task).await.unwrap(), StopReason::Cancelled);
        assert_eq!(*state.borrow_and_update(), LoopState::Stopped);
        drop(handle);
    }

    #[tokio::test]
    async fn test_help_command() {
        let (transport, handle) = pair();
        let config = HeraldConfig {
            dispatcher: DispatcherConfig {
                help_command: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .with_config(&config)
            .command("ping", |_ctx, _args| async { "pong" })
            .unwrap()
            .build();
        let (dispatcher, task) = start(dispatcher);

        handle.push_json(message("U1", "D1", "help"));
        let text = next_text(&handle).await;
        assert!(text.contains("`ping`"));
        assert!(text.contains("`help`"));
        assert_eq!(dispatcher.registry().len(), 2);

        handle.end();
        finish(task).await.unwrap();
    }

    #[tokio::test]
    async fn test_user_help_wins_over_builtin() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport))
            .config(DispatcherConfig {
                help_command: true,
                debug: true,
            })
            .command("help", |_ctx, _args| async { "custom help" })
            .unwrap()
            .build();
        let (_dispatcher, task) = start(dispatcher);

        handle.push_json(message("U1", "D1", "help"));
        assert_eq!(next_text(&handle).await, "custom help");

        handle.end();
        finish(task).await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_registered_while_running() {
        let (transport, handle) = pair();
        let dispatcher = Dispatcher::builder(Arc::new(transport)).build();
        let (dispatcher, task) = start(dispatcher);

        dispatcher
            .registry()
            .command("late", |_ctx, _args| async { "still routed" })
            .unwrap();
        handle.push_json(message("U1", "D1", "late"));
        assert_eq!(next_text(&handle).await, "still routed");

        handle.end();
        finish(task).await.unwrap();
    }
}
