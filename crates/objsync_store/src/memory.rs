//! In-memory bucket for testing.

use crate::bucket::{DestinationBucket, ObjectEntry, ObjectMetadata, SourceBucket};
use crate::digest::sha256_hex;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    created_at: Option<DateTime<Utc>>,
    /// Reported listing size when it should differ from the payload length
    /// (e.g. simulating objects too large to materialize in a test).
    size_override: Option<u64>,
}

/// An in-memory bucket implementing both the source and destination traits.
///
/// Suitable for unit and integration tests. Failures can be scripted per
/// key, uploads can be slowed down to observe concurrency, and upload
/// attempts are counted so retry behavior is verifiable.
#[derive(Debug, Default)]
pub struct InMemoryBucket {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    read_failures: Mutex<HashMap<String, u32>>,
    put_failures: Mutex<HashMap<String, u32>>,
    put_attempts: Mutex<HashMap<String, u32>>,
    corrupt_keys: Mutex<HashSet<String>>,
    put_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryBucket {
    /// Creates a new empty bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object with the given payload and creation time.
    pub fn insert(
        &self,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
        created_at: Option<DateTime<Utc>>,
    ) {
        self.objects.write().insert(
            name.into(),
            StoredObject {
                data: data.into(),
                created_at,
                size_override: None,
            },
        );
    }

    /// Inserts an object whose listed size differs from its payload.
    pub fn insert_sized(
        &self,
        name: impl Into<String>,
        size: u64,
        created_at: Option<DateTime<Utc>>,
    ) {
        self.objects.write().insert(
            name.into(),
            StoredObject {
                data: Vec::new(),
                created_at,
                size_override: Some(size),
            },
        );
    }

    /// Returns a copy of the payload stored at `key`, if any.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the bucket holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Scripts the next `times` reads of `name` to fail with a retryable
    /// backend error.
    pub fn fail_reads(&self, name: impl Into<String>, times: u32) {
        self.read_failures.lock().insert(name.into(), times);
    }

    /// Scripts the next `times` uploads to `key` to fail with a retryable
    /// backend error. Use `u32::MAX` to fail every attempt.
    pub fn fail_puts(&self, key: impl Into<String>, times: u32) {
        self.put_failures.lock().insert(key.into(), times);
    }

    /// Corrupts every payload stored at `key` by appending a stray byte,
    /// so the stored checksum never matches the uploaded stream.
    pub fn corrupt_puts(&self, key: impl Into<String>) {
        self.corrupt_keys.lock().insert(key.into());
    }

    /// Returns how many upload attempts were made for `key`.
    #[must_use]
    pub fn put_attempts(&self, key: &str) -> u32 {
        self.put_attempts.lock().get(key).copied().unwrap_or(0)
    }

    /// Delays every upload by `delay`, so tests can observe concurrency.
    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock() = Some(delay);
    }

    /// Returns the highest number of uploads observed executing at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn consume_failure(failures: &Mutex<HashMap<String, u32>>, key: &str) -> bool {
        let mut failures = failures.lock();
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

impl SourceBucket for InMemoryBucket {
    fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>> {
        let objects = self.objects.read();
        Ok(objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, obj)| ObjectEntry {
                name: name.clone(),
                size: obj.size_override.unwrap_or(obj.data.len() as u64),
                created_at: obj.created_at,
            })
            .collect())
    }

    fn open_read(&self, name: &str) -> StoreResult<Box<dyn Read + Send>> {
        if Self::consume_failure(&self.read_failures, name) {
            return Err(StoreError::backend_retryable(format!(
                "injected read failure for {name}"
            )));
        }
        let objects = self.objects.read();
        let obj = objects.get(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })?;
        Ok(Box::new(Cursor::new(obj.data.clone())))
    }

    fn check(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl DestinationBucket for InMemoryBucket {
    fn put(&self, key: &str, reader: &mut dyn Read) -> StoreResult<u64> {
        *self.put_attempts.lock().entry(key.to_string()).or_insert(0) += 1;

        if Self::consume_failure(&self.put_failures, key) {
            return Err(StoreError::backend_retryable(format!(
                "injected upload failure for {key}"
            )));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.put_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut data = Vec::new();
        let result = reader.read_to_end(&mut data);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result?;

        let bytes = data.len() as u64;
        if self.corrupt_keys.lock().contains(key) {
            data.push(0x00);
        }
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data,
                created_at: Some(Utc::now()),
                size_override: None,
            },
        );
        Ok(bytes)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.objects.read().contains_key(key))
    }

    fn head(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        let objects = self.objects.read();
        Ok(objects.get(key).map(|obj| ObjectMetadata {
            size: obj.data.len() as u64,
            checksum: Some(sha256_hex(&obj.data)),
            last_modified: obj.created_at,
        }))
    }

    fn check(&self) -> StoreResult<()> {
        Ok(())
    }
}
