//! Transfer executor: one object's download→upload under the retry policy.

use crate::config::{RetryPolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use objsync_store::{hex_encode, DestinationBucket, ObjectEntry, SourceBucket};
use sha2::{Digest, Sha256};
use std::io::{self, BufReader, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a successful transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Bytes streamed from source to destination.
    pub bytes_moved: u64,
    /// Wall-clock time spent, including retries and backoff.
    pub duration: Duration,
    /// Hex-encoded SHA-256 of the streamed content.
    pub checksum: Option<String>,
    /// Number of tries the transfer took (1 = no retries).
    pub attempts: u32,
}

/// Reader adapter that hashes everything passing through it.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn into_hex(self) -> String {
        hex_encode(&self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Streams single objects from source to destination with retry/backoff.
///
/// The executor never touches the state store; recording a completed
/// transfer is the orchestrator's job. That keeps it free of persistent
/// side effects and independently testable.
pub struct TransferExecutor {
    source: Arc<dyn SourceBucket>,
    destination: Arc<dyn DestinationBucket>,
    retry: RetryPolicy,
    chunk_size: usize,
    dry_run: bool,
    validate_checksum: bool,
}

impl TransferExecutor {
    /// Creates an executor from the shared pass configuration.
    pub fn new(
        source: Arc<dyn SourceBucket>,
        destination: Arc<dyn DestinationBucket>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            source,
            destination,
            retry: config.retry.clone(),
            chunk_size: config.chunk_size.max(1024),
            dry_run: config.dry_run,
            validate_checksum: config.validate_checksum,
        }
    }

    /// Transfers one object, retrying per policy on retryable errors.
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry budget is exhausted, or
    /// immediately for non-retryable errors.
    pub fn transfer(
        &self,
        entry: &ObjectEntry,
        destination_key: &str,
    ) -> SyncResult<TransferOutcome> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt_once(entry, destination_key) {
                Ok((bytes_moved, checksum)) => {
                    return Ok(TransferOutcome {
                        bytes_moved,
                        duration: started.elapsed(),
                        checksum,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.next_delay(attempt);
                    warn!(
                        object = %entry.name,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "transfer attempt failed; retrying"
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    warn!(
                        object = %entry.name,
                        attempts = attempt,
                        error = %err,
                        "transfer gave up"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// One streaming pass over the object. Chunked pass-through: the
    /// payload is never buffered whole in memory.
    fn attempt_once(
        &self,
        entry: &ObjectEntry,
        destination_key: &str,
    ) -> SyncResult<(u64, Option<String>)> {
        let reader = self.source.open_read(&entry.name)?;
        let mut hashing = HashingReader::new(BufReader::with_capacity(self.chunk_size, reader));

        if self.dry_run {
            let bytes = io::copy(&mut hashing, &mut io::sink())?;
            debug!(object = %entry.name, bytes, "dry run: source readable, skipping upload");
            return Ok((bytes, Some(hashing.into_hex())));
        }

        let bytes = self.destination.put(destination_key, &mut hashing)?;
        let digest = hashing.into_hex();

        if self.validate_checksum {
            if let Some(metadata) = self.destination.head(destination_key)? {
                if let Some(stored) = metadata.checksum {
                    if stored != digest {
                        return Err(SyncError::ChecksumMismatch {
                            name: entry.name.clone(),
                            expected: digest,
                            actual: stored,
                        });
                    }
                }
            }
        }

        Ok((bytes, Some(digest)))
    }
}
