//! Runtime error types.

use thiserror::Error;

use herald_core::AuthError;
use herald_framework::RegistryError;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that end a dispatch loop abnormally.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The transport reported that the credentials are no longer valid.
    #[error("Authentication rejected by the transport")]
    InvalidAuth,

    /// Connecting the transport failed.
    #[error("Failed to connect: {0}")]
    Connect(#[from] AuthError),

    /// `run` was called on a dispatcher that has already started.
    #[error("Dispatcher already started")]
    AlreadyStarted,

    /// A built-in command could not be registered.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
