//! Configuration for the Herald runtime.
//!
//! A [`HeraldConfig`] is layered from defaults, a `herald.toml` file,
//! `HERALD_*` environment variables and programmatic overrides by
//! [`ConfigLoader`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    DispatcherConfig, HeraldConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
