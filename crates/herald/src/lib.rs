//! # Herald
//!
//! Event-driven command dispatch over a real-time chat connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐ RawEvent ┌──────────┐ InboundEvent ┌──────────────┐  eligible  ┌────────┐
//! │ Transport │─────────▶│ classify │─────────────▶│ Dispatcher   │───────────▶│ Router │──▶ command (own task)
//! └───────────┘          └──────────┘              │ (one loop)   │            └────────┘
//!                                                  │              │──▶ init / error / unrecognized callbacks (own task)
//!                                                  └──────────────┘
//! ```
//!
//! - **Transport**: the connection; implement [`core::Transport`] for a real service
//! - **Dispatcher**: pulls events one at a time and never waits on a handler
//! - **Router**: first registered matching command wins, else the fallback
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     init_logging(&config);
//!
//!     let dispatcher = Dispatcher::builder(Arc::new(MyTransport::connect()))
//!         .with_config(&config)
//!         .command("ping", |_ctx, _args| async { "pong" })?
//!         .command("deploy <env>", |ctx, args| async move {
//!             ctx.reply(format!("deploying to {}", args.get_or("env", "staging"))).await
//!         })?
//!         .build();
//!
//!     dispatcher.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `herald.toml` (default)
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use herald_runtime::config::{ConfigLoader, HeraldConfig, load_config};
    pub use herald_runtime::logging::init_from_config as init_logging;
    pub use herald_runtime::{DispatchError, Dispatcher, LoopState, StopReason};

    // Commands and handlers
    pub use herald_framework::{
        CommandArgs, CommandDefinition, CommandMatcher, CommandRegistry, DispatchContext,
        HandlerOutcome, IntoOutcome, Reply,
    };

    // Events, messages and the transport boundary
    pub use herald_core::{
        Attachment, Block, BotIdentity, Credentials, OutgoingMessage, RawEvent, ReplyOptions,
        SendError, SendResult, Transport,
    };

    // Logging macros
    pub use herald_runtime::prelude::*;
}
