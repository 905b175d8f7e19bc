//! Error types for bucket operations.

use std::io;
use thiserror::Error;

/// Result type for bucket operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when talking to a bucket.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the underlying transport or filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested object does not exist.
    #[error("object not found: {name}")]
    NotFound {
        /// Name of the missing object.
        name: String,
    },

    /// Provider/backend error.
    #[error("backend error: {message}")]
    Backend {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },
}

impl StoreError {
    /// Creates a retryable backend error.
    pub fn backend_retryable(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable backend error.
    pub fn backend_fatal(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the operation that produced this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Io(_) => true,
            StoreError::NotFound { .. } => false,
            StoreError::Backend { retryable, .. } => *retryable,
        }
    }
}
