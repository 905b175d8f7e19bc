//! Error types for state persistence.

use std::io;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while persisting or loading transfer state.
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization or deserialization error.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Another process holds the state lock.
    #[error("state locked: another process has exclusive access")]
    StateLocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            StateError::StateLocked.to_string(),
            "state locked: another process has exclusive access"
        );
    }
}
