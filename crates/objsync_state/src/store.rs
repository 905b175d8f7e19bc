//! State store: load, diff gate, write-through persistence, cleanup.

use crate::error::{StateError, StateResult};
use crate::record::{Snapshot, TransferRecord};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read-only summary of the tracked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSummary {
    /// Number of tracked transfer records.
    pub total_files: usize,
    /// Sum of recorded object sizes in bytes.
    pub total_bytes: u64,
    /// When a snapshot was last persisted.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Manages the durable transfer-state snapshot.
///
/// All mutation happens under a single writer lock that also covers the
/// atomic file replace, so concurrent transfer workers can record results
/// without ever producing a torn snapshot. Transfer I/O itself must never
/// run under this lock.
///
/// # Single instance
///
/// `open` takes an exclusive advisory lock on `<file>.lock`. A second store
/// on the same path fails with `StateLocked` until the first is dropped.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
    _lock_file: File,
}

impl StateStore {
    /// Opens the state store, creating parent directories as needed.
    ///
    /// A missing snapshot file yields an empty store; a corrupt one is
    /// logged and replaced by an empty store on the next persist. Neither
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or another process
    /// holds the state lock.
    pub fn open(path: &Path) -> StateResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = sibling_with_suffix(path, ".lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StateError::StateLocked);
        }

        let snapshot = Self::load_snapshot(path);

        Ok(Self {
            path: path.to_path_buf(),
            snapshot: Mutex::new(snapshot),
            _lock_file: lock_file,
        })
    }

    fn load_snapshot(path: &Path) -> Snapshot {
        if !path.exists() {
            info!(path = %path.display(), "no existing state file, starting fresh");
            return Snapshot::empty();
        }

        match Self::read_snapshot(path) {
            Ok(snapshot) => {
                info!(
                    path = %path.display(),
                    files = snapshot.files.len(),
                    "loaded transfer state"
                );
                snapshot
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load state file; starting with empty state"
                );
                Snapshot::empty()
            }
        }
    }

    fn read_snapshot(path: &Path) -> StateResult<Snapshot> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the object at `key` is already mirrored and unchanged.
    ///
    /// This is the sole gate against redundant transfer: the stored size
    /// must match and the stored creation time must not be earlier than the
    /// candidate's. A candidate with no creation time is never up to date,
    /// so it is always re-transferred rather than silently skipped.
    pub fn is_up_to_date(&self, key: &str, size: u64, created_at: Option<DateTime<Utc>>) -> bool {
        let Some(candidate_created) = created_at else {
            return false;
        };

        let snapshot = self.snapshot.lock();
        let Some(record) = snapshot.files.get(key) else {
            return false;
        };

        if record.size != size {
            debug!(key, recorded = record.size, listed = size, "size changed");
            return false;
        }

        match record.created_at {
            Some(recorded_created) if recorded_created >= candidate_created => true,
            Some(_) => {
                debug!(key, "object recreated at source");
                false
            }
            None => false,
        }
    }

    /// Records a completed transfer and persists the snapshot write-through.
    ///
    /// A persist failure is logged but does not roll back the in-memory
    /// record; the next successful persist reconciles, and the worst case
    /// after a crash is one redundant re-transfer, which is a safe
    /// idempotent overwrite at the destination.
    pub fn record_transferred(
        &self,
        source_name: &str,
        destination_key: &str,
        size: u64,
        created_at: Option<DateTime<Utc>>,
        duration: Duration,
        checksum: Option<String>,
    ) {
        let record = TransferRecord {
            source_name: source_name.to_string(),
            destination_key: destination_key.to_string(),
            size,
            created_at,
            transferred_at: Utc::now(),
            checksum,
            duration_seconds: duration.as_secs_f64(),
        };

        let mut snapshot = self.snapshot.lock();
        snapshot.files.insert(destination_key.to_string(), record);
        if let Err(err) = self.persist_locked(&mut snapshot) {
            warn!(
                key = destination_key,
                error = %err,
                "failed to persist state snapshot; keeping in-memory record"
            );
        } else {
            debug!(key = destination_key, "marked as transferred");
        }
    }

    /// Persists the current snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails. The
    /// previous on-disk snapshot stays intact in that case.
    pub fn persist(&self) -> StateResult<()> {
        let mut snapshot = self.snapshot.lock();
        self.persist_locked(&mut snapshot)
    }

    /// Atomic save: serialize, write to a temporary file in the same
    /// directory, restrict permissions, fsync, rename over the target,
    /// fsync the directory. Must be called with the snapshot lock held.
    fn persist_locked(&self, snapshot: &mut Snapshot) -> StateResult<()> {
        snapshot.last_sync_at = Some(Utc::now());
        let data = serde_json::to_string_pretty(&*snapshot)?;

        let tmp_path = sibling_with_suffix(&self.path, ".tmp");
        fs::write(&tmp_path, data.as_bytes())?;
        restrict_permissions(&tmp_path)?;
        let file = File::open(&tmp_path)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                sync_directory(parent)?;
            }
        }

        debug!(path = %self.path.display(), "saved state snapshot");
        Ok(())
    }

    /// Removes records older than the retention window and persists if any
    /// were removed. A retention of zero days means "never expire".
    ///
    /// Returns the number of records removed.
    pub fn cleanup_expired(&self, retention_days: u32) -> usize {
        if retention_days == 0 {
            return 0;
        }

        let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
        let mut snapshot = self.snapshot.lock();
        let before = snapshot.files.len();
        snapshot
            .files
            .retain(|_, record| record.transferred_at >= cutoff);
        let removed = before - snapshot.files.len();

        if removed > 0 {
            info!(removed, "cleaned up expired state records");
            if let Err(err) = self.persist_locked(&mut snapshot) {
                warn!(error = %err, "failed to persist state after cleanup");
            }
        }
        removed
    }

    /// Returns the record for `key`, if one exists.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<TransferRecord> {
        self.snapshot.lock().files.get(key).cloned()
    }

    /// Returns the number of tracked records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.snapshot.lock().files.len()
    }

    /// Returns a read-only summary for health and connectivity checks.
    #[must_use]
    pub fn summary(&self) -> StateSummary {
        let snapshot = self.snapshot.lock();
        StateSummary {
            total_files: snapshot.files.len(),
            total_bytes: snapshot.files.values().map(|r| r.size).sum(),
            last_sync_at: snapshot.last_sync_at,
        }
    }

    /// Returns a clone of the in-memory snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.to_path_buf().into_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> StateResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> StateResult<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> StateResult<()> {
    // On Unix, fsync on a directory makes the rename durable.
    let dir = File::open(dir)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StateResult<()> {
    Ok(())
}
