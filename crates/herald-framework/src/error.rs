//! Error types for the Herald framework.

use thiserror::Error;

/// Errors that can occur while defining or registering commands.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The matcher has no text to match against.
    #[error("command matcher must not be empty")]
    EmptyMatcher,

    /// A pattern spec could not be compiled.
    #[error("invalid command pattern '{spec}': {reason}")]
    InvalidPattern {
        /// The spec as written.
        spec: String,
        /// Why compilation failed.
        reason: String,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
