//! Pass phases and aggregate statistics.

use std::time::Duration;

/// The stage a sync pass is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No pass is running.
    Idle,
    /// Enumerating candidate objects at the source.
    Listing,
    /// Classifying candidates against persisted state.
    Diffing,
    /// Transfers executing on the worker pool.
    Transferring,
    /// Writing the final snapshot of the pass.
    Persisting,
    /// Expiring old state records.
    Cleanup,
}

impl SyncPhase {
    /// Returns true while a pass is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncPhase::Idle)
    }
}

/// Aggregate outcome of one sync pass.
///
/// Built fresh per pass and returned to the caller; never persisted. A
/// nonzero `files_failed` is the signal callers use for a non-success exit
/// code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Candidates found by the listing after filtering.
    pub files_found: u64,
    /// Transfers that completed successfully.
    pub files_transferred: u64,
    /// Candidates already up to date.
    pub files_skipped: u64,
    /// Candidates that failed after retries (or failed validation).
    pub files_failed: u64,
    /// Total bytes moved by successful transfers.
    pub bytes_transferred: u64,
    /// Wall-clock duration of the pass.
    pub elapsed: Duration,
}

impl SyncStats {
    /// Returns true if any candidate failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_activity() {
        assert!(!SyncPhase::Idle.is_active());
        assert!(SyncPhase::Listing.is_active());
        assert!(SyncPhase::Transferring.is_active());
        assert!(SyncPhase::Cleanup.is_active());
    }

    #[test]
    fn failure_signal() {
        let mut stats = SyncStats::default();
        assert!(!stats.has_failures());
        stats.files_failed = 1;
        assert!(stats.has_failures());
    }
}
