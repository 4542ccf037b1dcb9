//! Error taxonomy for the enforcement engine.
//!
//! Policy outcomes (block/warn) are never errors; they are `RuleResult`s.
//! These variants cover the cases where a run cannot be completed at all.

use std::time::Duration;

/// FlowForge engine errors.
#[derive(Debug, thiserror::Error)]
pub enum FlowforgeError {
    #[error("unknown enforcement context: {0}")]
    UnknownContext(String),

    #[error("unknown aggregation policy: {0}")]
    UnknownPolicy(String),

    #[error("unknown output format: {0}")]
    UnknownFormat(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("invalid capability pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("state error: {0}")]
    State(#[from] flowforge_state::StateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for FlowForge engine operations.
pub type Result<T> = std::result::Result<T, FlowforgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error_names_command() {
        let err = FlowforgeError::Timeout {
            command: "git diff --cached".to_string(),
            timeout: Duration::from_secs(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("git diff --cached"));
        assert!(msg.contains("10s"));
    }

    #[test]
    fn test_state_error_converts() {
        let err: FlowforgeError = flowforge_state::StateError::TokenNotFound("t-1".into()).into();
        assert!(err.to_string().contains("t-1"));
    }
}
