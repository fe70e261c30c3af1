//! # Herald Framework
//!
//! The command half of Herald: how message text is matched, how handlers are
//! stored and invoked, and what context they see.
//!
//! - [`CommandMatcher`] tests text and extracts [`CommandArgs`]
//! - [`CommandRegistry`] keeps [`CommandDefinition`]s in registration order
//! - [`eligibility`] decides whether a message is addressed to the bot
//! - [`CommandRouter`] runs the first matching command, or the fallback
//! - [`DispatchContext`] is what every handler and callback receives
//!
//! ```rust,ignore
//! let registry = Arc::new(CommandRegistry::new());
//! registry.command("ping", |_ctx, _args| async { "pong" })?;
//! registry.command("echo *", |_ctx, args| async move {
//!     args.rest().unwrap_or_default().to_string()
//! })?;
//!
//! let router = CommandRouter::new(registry)
//!     .fallback(|ctx, _args| async move { ctx.reply("unknown command").await });
//! ```

pub mod command;
pub mod context;
pub mod error;
pub mod filter;
pub mod handler;
pub mod help;
pub mod matcher;
pub mod registry;
pub mod router;
pub mod split;

pub use command::{CommandArgs, CommandDefinition};
pub use context::{DispatchContext, Session};
pub use error::{RegistryError, RegistryResult};
pub use filter::{Eligibility, eligibility, should_route, strip_mention};
pub use handler::{
    BoxFuture, BoxedCallback, BoxedHandler, CommandHandler, HandlerFn, HandlerOutcome,
    IntoOutcome, Reply, into_callback, into_handler, into_unit_callback, run_guarded,
};
pub use help::{HELP_COMMAND, help_command, help_text};
pub use matcher::CommandMatcher;
pub use registry::{CommandRegistry, CommandSnapshot};
pub use router::{CommandRouter, RouteResult};
pub use split::shell_split;
