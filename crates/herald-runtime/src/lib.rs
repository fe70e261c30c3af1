//! Herald Runtime - the dispatch loop and its ambient setup.
//!
//! This crate provides:
//! - The [`Dispatcher`], which connects a transport and drives the loop
//! - Layered configuration loading ([`config::ConfigLoader`])
//! - Logging setup ([`logging::LoggingBuilder`])
//!
//! ```rust,ignore
//! use herald_runtime::{Dispatcher, config::load_config, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config);
//!
//!     let dispatcher = Dispatcher::builder(Arc::new(MyTransport::new()))
//!         .with_config(&config)
//!         .command("ping", |_ctx, _args| async { "pong" })?
//!         .build();
//!
//!     dispatcher.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatcherConfig, HeraldConfig, LoggingConfig,
};
pub use dispatcher::{Dispatcher, DispatcherBuilder, LoopState, StopReason};
pub use error::{DispatchError, DispatchResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
