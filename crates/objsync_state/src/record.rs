//! Snapshot document and transfer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// A durable record of one completed transfer.
///
/// Keyed by `destination_key` in the snapshot; created or overwritten only
/// after the transfer it describes actually succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Full object name at the source, including any path prefix.
    pub source_name: String,
    /// Key the object was stored under at the destination.
    pub destination_key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Creation time reported by the source, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the transfer completed.
    pub transferred_at: DateTime<Utc>,
    /// Hex-encoded SHA-256 of the transferred content, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Wall-clock transfer duration in seconds.
    pub duration_seconds: f64,
}

/// The complete persisted state document.
///
/// `files` is a `BTreeMap` so the serialized form is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version.
    pub version: String,
    /// When a snapshot was last persisted.
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Transfer records keyed by destination key.
    #[serde(default)]
    pub files: BTreeMap<String, TransferRecord>,
}

impl Snapshot {
    /// Creates an empty snapshot at the current format version.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            last_sync_at: None,
            files: BTreeMap::new(),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_shape() {
        let snapshot = Snapshot::empty();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert!(snapshot.last_sync_at.is_none());
        assert!(snapshot.files.is_empty());
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        // Older or hand-edited files may omit optional fields entirely.
        let parsed: Snapshot = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert!(parsed.files.is_empty());
        assert!(parsed.last_sync_at.is_none());
    }

    #[test]
    fn record_omits_absent_optionals() {
        let record = TransferRecord {
            source_name: "reports/a.csv.gz".into(),
            destination_key: "mirrored/a.csv.gz".into(),
            size: 42,
            created_at: None,
            transferred_at: Utc::now(),
            checksum: None,
            duration_seconds: 0.5,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("created_at"));
        assert!(!json.contains("checksum"));
    }
}
