//! Error types for core data handling.

use thiserror::Error;

/// Errors raised while building or decoding core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A role string did not name a known role.
    #[error("unknown message role '{0}' (expected one of system, user, model, tool)")]
    UnknownRole(String),
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
