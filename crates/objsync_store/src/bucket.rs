//! Bucket traits for object-storage providers.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use std::io::Read;

/// Descriptor for a remote object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object name, including any path prefix.
    pub name: String,
    /// Object size in bytes.
    pub size: u64,
    /// Creation time reported by the provider, when available.
    pub created_at: Option<DateTime<Utc>>,
}

impl ObjectEntry {
    /// Creates a new entry.
    pub fn new(name: impl Into<String>, size: u64, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            size,
            created_at,
        }
    }

    /// Returns the object name with any path prefix stripped.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Metadata reported for a stored object.
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    /// Object size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the content, when the provider reports one.
    pub checksum: Option<String>,
    /// Last modification time, when the provider reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Read side of a bucket: listing and streaming download.
///
/// Implementations handle pagination internally; `list` returns the fully
/// materialized result.
pub trait SourceBucket: Send + Sync {
    /// Lists all objects whose name starts with `prefix`.
    fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>>;

    /// Opens a streaming reader for the object.
    fn open_read(&self, name: &str) -> StoreResult<Box<dyn Read + Send>>;

    /// Verifies connectivity and read permissions without side effects.
    fn check(&self) -> StoreResult<()>;
}

/// Write side of a bucket: streaming upload and metadata checks.
pub trait DestinationBucket: Send + Sync {
    /// Streams `reader` into the object at `key`, replacing any existing
    /// object. Returns the number of bytes written.
    fn put(&self, key: &str, reader: &mut dyn Read) -> StoreResult<u64>;

    /// Returns true if an object exists at `key`.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Returns metadata for the object at `key`, or `None` if it does not
    /// exist.
    fn head(&self, key: &str) -> StoreResult<Option<ObjectMetadata>>;

    /// Verifies connectivity and write permissions.
    fn check(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_path_prefix() {
        let entry = ObjectEntry::new("FOCUS Reports/2026/report.csv.gz", 10, None);
        assert_eq!(entry.basename(), "report.csv.gz");

        let flat = ObjectEntry::new("report.csv.gz", 10, None);
        assert_eq!(flat.basename(), "report.csv.gz");
    }
}
