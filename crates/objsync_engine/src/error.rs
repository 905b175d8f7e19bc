//! Error types for the sync engine.

use crate::stats::SyncPhase;
use objsync_state::StateError;
use objsync_store::StoreError;
use std::io;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Provider error during a transfer attempt.
    #[error("bucket error: {0}")]
    Store(#[from] StoreError),

    /// Streaming I/O error during a transfer attempt.
    #[error("stream error: {0}")]
    Io(#[from] io::Error),

    /// The source listing failed; the pass is aborted before any transfer.
    #[error("listing failed: {source}")]
    Listing {
        /// Underlying provider error.
        #[source]
        source: StoreError,
    },

    /// The streamed checksum disagrees with destination metadata.
    #[error("checksum mismatch for {name}: streamed {expected}, stored {actual}")]
    ChecksumMismatch {
        /// Object name at the source.
        name: String,
        /// Checksum computed while streaming.
        expected: String,
        /// Checksum reported by the destination.
        actual: String,
    },

    /// The object exceeds the configured size limit.
    #[error("{name} is {size} bytes, over the {limit} byte limit")]
    SizeLimit {
        /// Object name at the source.
        name: String,
        /// Listed object size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// State persistence error.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// A sync pass is already running.
    #[error("sync pass already in progress (phase {phase:?})")]
    PassInProgress {
        /// Phase the running pass was observed in.
        phase: SyncPhase,
    },

    /// The pass was cancelled by a shutdown request.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Returns true if a transfer attempt that produced this error may be
    /// retried. Size-limit violations and pass-level errors never are;
    /// checksum mismatches are treated like transient transport errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(err) => err.is_retryable(),
            SyncError::Io(_) => true,
            SyncError::ChecksumMismatch { .. } => true,
            SyncError::Listing { .. }
            | SyncError::SizeLimit { .. }
            | SyncError::State(_)
            | SyncError::PassInProgress { .. }
            | SyncError::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::Store(StoreError::backend_retryable("reset")).is_retryable());
        assert!(!SyncError::Store(StoreError::backend_fatal("denied")).is_retryable());
        assert!(SyncError::ChecksumMismatch {
            name: "a".into(),
            expected: "1".into(),
            actual: "2".into()
        }
        .is_retryable());
        assert!(!SyncError::SizeLimit {
            name: "a".into(),
            size: 10,
            limit: 5
        }
        .is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::SizeLimit {
            name: "reports/big.csv.gz".into(),
            size: 6_000_000_000,
            limit: 5_000_000_000,
        };
        assert!(err.to_string().contains("over the 5000000000 byte limit"));
    }
}
