//! Scheduler: periodic sync passes with cooperative shutdown.

use crate::orchestrator::Orchestrator;
use crate::stats::SyncStats;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// The state of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not running.
    Idle,
    /// A sync pass is executing.
    Syncing,
    /// Waiting for the next poll interval.
    Sleeping,
}

/// Handle used to request a graceful stop of a running scheduler.
///
/// Stopping prevents any new pass from starting and asks the orchestrator
/// to abandon transfers it has not yet dispatched; in-flight transfers run
/// to completion.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    orchestrator: Arc<Orchestrator>,
}

impl ShutdownHandle {
    /// Requests a graceful shutdown.
    pub fn stop(&self) {
        info!("initiating graceful shutdown");
        self.flag.store(true, Ordering::SeqCst);
        self.orchestrator.cancel();
    }

    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Runs sync passes on a fixed interval until stopped.
///
/// The shutdown flag is checked at well-defined points only: after each
/// pass and after each one-second slice of sleep. Passes are strictly
/// sequential; a new pass never starts before the previous one has
/// finished persisting.
pub struct Scheduler {
    interval: Duration,
    orchestrator: Arc<Orchestrator>,
    state: RwLock<SchedulerState>,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Creates a scheduler triggering a pass every `interval`.
    pub fn new(interval: Duration, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            interval,
            orchestrator,
            state: RwLock::new(SchedulerState::Idle),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the current loop state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    /// Returns a handle that stops this scheduler.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }

    /// Runs the scheduler loop until a shutdown is requested.
    pub fn run_forever(&self) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        while !self.shutdown.load(Ordering::SeqCst) {
            *self.state.write() = SchedulerState::Syncing;
            match self.orchestrator.sync(false) {
                Ok(stats) => log_pass_outcome(&stats),
                Err(err) => error!(error = %err, "sync pass failed"),
            }

            *self.state.write() = SchedulerState::Sleeping;
            info!(secs = self.interval.as_secs(), "next sync scheduled");
            self.sleep_interruptibly();
        }

        *self.state.write() = SchedulerState::Idle;
        info!("scheduler stopped");
    }

    /// Sleeps for the poll interval in slices of at most one second so a
    /// shutdown request is honored promptly.
    fn sleep_interruptibly(&self) {
        let mut remaining = self.interval;
        while remaining > Duration::ZERO && !self.shutdown.load(Ordering::SeqCst) {
            let slice = remaining.min(Duration::from_secs(1));
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}

fn log_pass_outcome(stats: &SyncStats) {
    if stats.has_failures() {
        warn!(failed = stats.files_failed, "sync completed with failures");
    } else {
        info!(
            transferred = stats.files_transferred,
            skipped = stats.files_skipped,
            "sync completed successfully"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use objsync_state::StateStore;
    use objsync_store::{DestinationBucket, InMemoryBucket, SourceBucket};
    use tempfile::tempdir;

    fn scheduler_fixture(interval: Duration) -> (Arc<Scheduler>, Arc<InMemoryBucket>) {
        let temp = tempdir().unwrap();
        let state = Arc::new(StateStore::open(&temp.path().join("state.json")).unwrap());
        // Leak the tempdir so the state file outlives this helper.
        std::mem::forget(temp);

        let bucket = Arc::new(InMemoryBucket::new());
        let orchestrator = Arc::new(Orchestrator::new(
            SyncConfig::new("reports/", "mirrored"),
            Arc::clone(&bucket) as Arc<dyn SourceBucket>,
            Arc::clone(&bucket) as Arc<dyn DestinationBucket>,
            state,
        ));
        (Arc::new(Scheduler::new(interval, orchestrator)), bucket)
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let (scheduler, _bucket) = scheduler_fixture(Duration::from_millis(50));
        let handle = scheduler.shutdown_handle();

        let runner = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.run_forever())
        };

        thread::sleep(Duration::from_millis(120));
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());

        runner.join().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn passes_repeat_until_stopped() {
        let (scheduler, bucket) = scheduler_fixture(Duration::from_millis(20));
        bucket.insert("reports/a.csv.gz", b"abc".to_vec(), None);
        let handle = scheduler.shutdown_handle();

        let runner = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.run_forever())
        };

        thread::sleep(Duration::from_millis(150));
        handle.stop();
        runner.join().unwrap();

        // The object is undated, so every pass re-transfers it; more than
        // one attempt proves the loop kept triggering passes.
        assert!(bucket.put_attempts("mirrored/a.csv.gz") > 1);
    }
}
