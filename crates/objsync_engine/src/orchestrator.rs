//! Orchestrator: diff the source listing against persisted state and drive
//! bounded-parallel transfers.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::TransferExecutor;
use crate::stats::{SyncPhase, SyncStats};
use chrono::{Duration as ChronoDuration, Utc};
use objsync_state::StateStore;
use objsync_store::{DestinationBucket, ObjectEntry, SourceBucket};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives one sync pass at a time: listing, diffing, transferring on a
/// bounded worker pool, persisting, and retention cleanup.
///
/// All collaborators are injected at construction; the orchestrator owns no
/// global state.
pub struct Orchestrator {
    config: SyncConfig,
    source: Arc<dyn SourceBucket>,
    state: Arc<StateStore>,
    executor: TransferExecutor,
    phase: RwLock<SyncPhase>,
    cancelled: AtomicBool,
}

impl Orchestrator {
    /// Creates a new orchestrator over the given buckets and state store.
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SourceBucket>,
        destination: Arc<dyn DestinationBucket>,
        state: Arc<StateStore>,
    ) -> Self {
        let executor = TransferExecutor::new(Arc::clone(&source), destination, &config);
        Self {
            config,
            source,
            state,
            executor,
            phase: RwLock::new(SyncPhase::Idle),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the phase the current (or last) pass is in.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// Requests that the running pass abandon transfers it has not yet
    /// started. In-flight transfers run to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    /// Runs one full sync pass.
    ///
    /// With `force` every candidate is transferred regardless of persisted
    /// state. Per-object failures are counted and logged but never abort
    /// the pass; a listing failure aborts it with zero transfers attempted.
    ///
    /// # Errors
    ///
    /// Returns `PassInProgress` if a pass is already running, or `Listing`
    /// if the candidate set could not be established.
    pub fn sync(&self, force: bool) -> SyncResult<SyncStats> {
        {
            let mut phase = self.phase.write();
            if phase.is_active() {
                return Err(SyncError::PassInProgress { phase: *phase });
            }
            *phase = SyncPhase::Listing;
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let started = Instant::now();
        let mut stats = SyncStats::default();
        if force {
            info!("forced sync: ignoring persisted state");
        }

        let candidates = match self.list_candidates() {
            Ok(candidates) => candidates,
            Err(err) => {
                self.set_phase(SyncPhase::Idle);
                error!(error = %err, "listing failed; aborting pass");
                return Err(err);
            }
        };
        stats.files_found = candidates.len() as u64;

        self.set_phase(SyncPhase::Diffing);
        let mut pending: Vec<(ObjectEntry, String)> = Vec::new();
        for entry in candidates {
            let key = self.destination_key(&entry);

            if let Some(limit) = self.config.max_file_size {
                if entry.size > limit {
                    let err = SyncError::SizeLimit {
                        name: entry.name.clone(),
                        size: entry.size,
                        limit,
                    };
                    error!(error = %err, "size validation failed");
                    stats.files_failed += 1;
                    continue;
                }
            }

            if !force && self.state.is_up_to_date(&key, entry.size, entry.created_at) {
                debug!(object = %entry.name, "already up to date");
                stats.files_skipped += 1;
                continue;
            }

            pending.push((entry, key));
        }

        self.set_phase(SyncPhase::Transferring);
        let (transferred, bytes, failed) = self.run_transfers(&pending);
        stats.files_transferred = transferred;
        stats.bytes_transferred = bytes;
        stats.files_failed += failed;

        self.set_phase(SyncPhase::Persisting);
        if !self.config.dry_run {
            if let Err(err) = self.state.persist() {
                warn!(error = %err, "failed to persist state at end of pass");
            }
        }

        self.set_phase(SyncPhase::Cleanup);
        self.state.cleanup_expired(self.config.retention_days);

        self.set_phase(SyncPhase::Idle);
        stats.elapsed = started.elapsed();
        info!(
            found = stats.files_found,
            transferred = stats.files_transferred,
            skipped = stats.files_skipped,
            failed = stats.files_failed,
            bytes = stats.bytes_transferred,
            elapsed_secs = stats.elapsed.as_secs_f64(),
            "sync pass complete"
        );
        Ok(stats)
    }

    /// Lists and filters the candidate set for this pass.
    fn list_candidates(&self) -> SyncResult<Vec<ObjectEntry>> {
        let listed = self
            .source
            .list(&self.config.source_prefix)
            .map_err(|source| SyncError::Listing { source })?;

        let suffix = self.config.suffix.to_lowercase();
        let cutoff = (self.config.lookback_days > 0)
            .then(|| Utc::now() - ChronoDuration::days(i64::from(self.config.lookback_days)));

        let candidates: Vec<ObjectEntry> = listed
            .into_iter()
            .filter(|entry| suffix.is_empty() || entry.name.to_lowercase().ends_with(&suffix))
            .filter(|entry| match (cutoff, entry.created_at) {
                // Undated entries stay in: the diff stage fails open on them.
                (Some(cutoff), Some(created)) => created >= cutoff,
                _ => true,
            })
            .collect();

        info!(
            prefix = %self.config.source_prefix,
            candidates = candidates.len(),
            "listing complete"
        );
        Ok(candidates)
    }

    /// Runs transfers on a fixed-size worker pool. Workers claim candidates
    /// through an atomic cursor, so nothing queues beyond the pool itself.
    fn run_transfers(&self, pending: &[(ObjectEntry, String)]) -> (u64, u64, u64) {
        let transferred = AtomicU64::new(0);
        let bytes = AtomicU64::new(0);
        let failed = AtomicU64::new(0);

        if !pending.is_empty() {
            let cursor = AtomicUsize::new(0);
            let workers = self.config.max_concurrent_transfers.max(1).min(pending.len());

            thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(|| loop {
                        if self.cancelled.load(Ordering::SeqCst) {
                            debug!("shutdown requested; abandoning queued transfers");
                            break;
                        }
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        let Some((entry, key)) = pending.get(index) else {
                            break;
                        };

                        match self.executor.transfer(entry, key) {
                            Ok(outcome) => {
                                if !self.config.dry_run {
                                    self.state.record_transferred(
                                        &entry.name,
                                        key,
                                        entry.size,
                                        entry.created_at,
                                        outcome.duration,
                                        outcome.checksum.clone(),
                                    );
                                }
                                transferred.fetch_add(1, Ordering::SeqCst);
                                bytes.fetch_add(outcome.bytes_moved, Ordering::SeqCst);
                                info!(
                                    object = %entry.name,
                                    key = %key,
                                    bytes = outcome.bytes_moved,
                                    attempts = outcome.attempts,
                                    "transfer complete"
                                );
                            }
                            Err(err) => {
                                failed.fetch_add(1, Ordering::SeqCst);
                                error!(object = %entry.name, error = %err, "transfer failed");
                            }
                        }
                    });
                }
            });
        }

        (
            transferred.load(Ordering::SeqCst),
            bytes.load(Ordering::SeqCst),
            failed.load(Ordering::SeqCst),
        )
    }

    /// Derives the destination key: source basename under the configured
    /// destination prefix.
    fn destination_key(&self, entry: &ObjectEntry) -> String {
        let name = entry.basename();
        let prefix = self.config.destination_prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use chrono::DateTime;
    use objsync_store::{InMemoryBucket, StoreError};
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast_config() -> SyncConfig {
        SyncConfig::new("reports/", "mirrored").with_retry(
            RetryPolicy::new(2)
                .with_initial_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2)),
        )
    }

    fn created(ts: &str) -> Option<DateTime<Utc>> {
        Some(ts.parse().unwrap())
    }

    struct Fixture {
        bucket: Arc<InMemoryBucket>,
        state: Arc<StateStore>,
        _temp: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let state = Arc::new(StateStore::open(&temp.path().join("state.json")).unwrap());
            Self {
                bucket: Arc::new(InMemoryBucket::new()),
                state,
                _temp: temp,
            }
        }

        fn orchestrator(&self, config: SyncConfig) -> Orchestrator {
            Orchestrator::new(
                config,
                Arc::clone(&self.bucket) as Arc<dyn SourceBucket>,
                Arc::clone(&self.bucket) as Arc<dyn DestinationBucket>,
                Arc::clone(&self.state),
            )
        }
    }

    #[test]
    fn empty_candidate_set_is_a_successful_noop() {
        let fixture = Fixture::new();
        let orchestrator = fixture.orchestrator(fast_config());

        let stats = orchestrator.sync(false).unwrap();
        assert_eq!(stats.files_found, 0);
        assert_eq!(stats.files_transferred, 0);
        assert_eq!(stats.files_skipped, 0);
        assert_eq!(stats.files_failed, 0);
        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
    }

    #[test]
    fn suffix_filter_defines_candidate_set() {
        let fixture = Fixture::new();
        fixture
            .bucket
            .insert("reports/a.csv.gz", b"a".to_vec(), created("2026-01-10T00:00:00Z"));
        fixture
            .bucket
            .insert("reports/readme.txt", b"b".to_vec(), created("2026-01-10T00:00:00Z"));
        fixture
            .bucket
            .insert("reports/B.CSV.GZ", b"c".to_vec(), created("2026-01-10T00:00:00Z"));
        let orchestrator = fixture.orchestrator(fast_config());

        let stats = orchestrator.sync(false).unwrap();
        assert_eq!(stats.files_found, 2);
        assert_eq!(stats.files_transferred, 2);
    }

    #[test]
    fn lookback_window_narrows_listing() {
        let fixture = Fixture::new();
        let recent = Utc::now() - ChronoDuration::days(1);
        let ancient = Utc::now() - ChronoDuration::days(90);
        fixture
            .bucket
            .insert("reports/new.csv.gz", b"n".to_vec(), Some(recent));
        fixture
            .bucket
            .insert("reports/old.csv.gz", b"o".to_vec(), Some(ancient));
        // Undated objects survive the window filter.
        fixture.bucket.insert("reports/undated.csv.gz", b"u".to_vec(), None);

        let orchestrator = fixture.orchestrator(fast_config().with_lookback_days(7));
        let stats = orchestrator.sync(false).unwrap();

        assert_eq!(stats.files_found, 2);
        assert_eq!(stats.files_transferred, 2);
        assert!(fixture.state.record("mirrored/old.csv.gz").is_none());
    }

    #[test]
    fn undated_candidate_is_always_transferred() {
        let fixture = Fixture::new();
        fixture.bucket.insert("reports/a.csv.gz", b"aa".to_vec(), None);
        let orchestrator = fixture.orchestrator(fast_config());

        let first = orchestrator.sync(false).unwrap();
        assert_eq!(first.files_transferred, 1);

        // Still no creation time on the second pass: transferred again, not
        // silently skipped.
        let second = orchestrator.sync(false).unwrap();
        assert_eq!(second.files_transferred, 1);
        assert_eq!(second.files_skipped, 0);
    }

    #[test]
    fn size_limit_violation_fails_without_attempt() {
        let fixture = Fixture::new();
        fixture.bucket.insert_sized(
            "reports/huge.csv.gz",
            6 * 1024 * 1024 * 1024,
            created("2026-01-10T00:00:00Z"),
        );
        let orchestrator =
            fixture.orchestrator(fast_config().with_max_file_size(5 * 1024 * 1024 * 1024));

        let stats = orchestrator.sync(false).unwrap();
        assert_eq!(stats.files_found, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_transferred, 0);
        assert_eq!(fixture.bucket.put_attempts("mirrored/huge.csv.gz"), 0);
    }

    #[test]
    fn listing_failure_aborts_the_pass() {
        let temp = tempdir().unwrap();
        let state = Arc::new(StateStore::open(&temp.path().join("state.json")).unwrap());

        struct BrokenSource;
        impl SourceBucket for BrokenSource {
            fn list(&self, _prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
                Err(StoreError::backend_retryable("listing exploded"))
            }
            fn open_read(
                &self,
                name: &str,
            ) -> Result<Box<dyn std::io::Read + Send>, StoreError> {
                Err(StoreError::NotFound { name: name.into() })
            }
            fn check(&self) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let orchestrator = Orchestrator::new(
            fast_config(),
            Arc::new(BrokenSource),
            Arc::new(InMemoryBucket::new()) as Arc<dyn DestinationBucket>,
            state,
        );

        let result = orchestrator.sync(false);
        assert!(matches!(result, Err(SyncError::Listing { .. })));
        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
    }

    #[test]
    fn destination_key_applies_prefix_and_strips_path() {
        let fixture = Fixture::new();
        fixture.bucket.insert(
            "reports/2026/01/a.csv.gz",
            b"data".to_vec(),
            created("2026-01-10T00:00:00Z"),
        );
        let orchestrator = fixture.orchestrator(fast_config());

        orchestrator.sync(false).unwrap();
        assert!(fixture.bucket.exists("mirrored/a.csv.gz").unwrap());
        assert!(fixture.state.record("mirrored/a.csv.gz").is_some());
    }

    #[test]
    fn cancel_abandons_queued_transfers() {
        let fixture = Fixture::new();
        for i in 0..20 {
            fixture.bucket.insert(
                format!("reports/{i:02}.csv.gz"),
                vec![b'x'; 8],
                created("2026-01-10T00:00:00Z"),
            );
        }
        fixture.bucket.set_put_delay(Duration::from_millis(20));
        let orchestrator =
            Arc::new(fixture.orchestrator(fast_config().with_max_concurrent_transfers(1)));

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            std::thread::spawn(move || orchestrator.sync(false))
        };
        std::thread::sleep(Duration::from_millis(30));
        orchestrator.cancel();

        let stats = handle.join().unwrap().unwrap();
        assert!(stats.files_transferred < 20, "cancel should cut the pass short");
    }
}
