//! Error types for flowforge-state

use thiserror::Error;

/// Errors that can occur in the state persistence layer
#[derive(Error, Debug)]
pub enum StateError {
    /// Filesystem error
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Token lookup failed
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    /// A token was requested with a non-positive lifetime
    #[error("Invalid token lifetime: {0} seconds")]
    InvalidTtl(i64),

    /// Empty session or capability identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}
