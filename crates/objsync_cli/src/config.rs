//! YAML configuration for the agent.
//!
//! Every section has defaults, so a minimal file only names the source and
//! destination roots. Validation happens once at load time and reports
//! every problem, not just the first.

use objsync_engine::{RetryPolicy, SyncConfig};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file is empty.
    #[error("configuration file is empty: {path}")]
    Empty {
        /// Path that was read.
        path: PathBuf,
    },

    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid YAML for the expected schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted field path, e.g. `agent.poll_interval`.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Source bucket settings.
    pub source: SourceSection,
    /// Destination bucket settings.
    pub destination: DestinationSection,
    /// Scheduler and concurrency settings.
    pub agent: AgentSection,
    /// Retry timing.
    pub retry: RetrySection,
    /// State persistence settings.
    pub state: StateSection,
    /// Logging settings.
    pub logging: LoggingSection,
    /// Advanced tuning.
    pub advanced: AdvancedSection,
}

/// Source bucket settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Bucket root directory.
    pub root: String,
    /// Listing prefix.
    pub prefix: String,
    /// Accepted object suffix.
    pub suffix: String,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            root: String::new(),
            prefix: String::new(),
            suffix: ".csv.gz".to_string(),
        }
    }
}

/// Destination bucket settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DestinationSection {
    /// Bucket root directory.
    pub root: String,
    /// Prefix prepended to every destination key.
    pub prefix: String,
}

/// Scheduler and concurrency settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Seconds between sync passes.
    pub poll_interval: u64,
    /// Only consider objects created within this many days; 0 = unbounded.
    pub lookback_days: u32,
    /// Size of the transfer worker pool.
    pub max_concurrent_transfers: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            poll_interval: 600,
            lookback_days: 0,
            max_concurrent_transfers: 3,
        }
    }
}

/// Retry timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Seconds before the first retry.
    pub initial_delay: u64,
    /// Backoff multiplier per further retry.
    pub backoff_multiplier: f64,
    /// Maximum seconds for any single delay.
    pub max_delay: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: 5,
            backoff_multiplier: 2.0,
            max_delay: 300,
        }
    }
}

/// State persistence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateSection {
    /// Snapshot file path.
    pub file: String,
    /// Expire records after this many days; 0 = never.
    pub retention_days: u32,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            file: "./state/state.json".to_string(),
            retention_days: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Advanced tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvancedSection {
    /// Enforce the size limit below.
    pub validate_file_size: bool,
    /// Largest accepted object in GiB.
    pub max_file_size_gb: u64,
    /// Streaming buffer size in bytes.
    pub chunk_size_bytes: usize,
    /// Compare streamed checksums against destination metadata.
    pub validate_checksum: bool,
    /// Read the source but skip destination writes and state updates.
    pub dry_run: bool,
}

impl Default for AdvancedSection {
    fn default() -> Self {
        Self {
            validate_file_size: true,
            max_file_size_gb: 5,
            chunk_size_bytes: 8 * 1024 * 1024,
            validate_checksum: true,
            dry_run: false,
        }
    }
}

impl AgentConfig {
    /// Loads and parses the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, empty, unreadable, or not
    /// valid YAML for the expected schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let data = fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(serde_yaml::from_str(&data)?)
    }

    /// Validates the configuration, returning every problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut issue = |field: &'static str, message: String| {
            issues.push(ConfigIssue { field, message });
        };

        if self.source.root.trim().is_empty() {
            issue("source.root", "source bucket root is required".into());
        }
        if self.destination.root.trim().is_empty() {
            issue("destination.root", "destination bucket root is required".into());
        }
        if self.agent.poll_interval < 60 {
            issue(
                "agent.poll_interval",
                format!("must be at least 60 seconds, got {}", self.agent.poll_interval),
            );
        }
        if self.agent.max_concurrent_transfers < 1 {
            issue(
                "agent.max_concurrent_transfers",
                "must be at least 1".into(),
            );
        }
        if self.retry.backoff_multiplier < 1.0 {
            issue(
                "retry.backoff_multiplier",
                format!("must be at least 1.0, got {}", self.retry.backoff_multiplier),
            );
        }
        if self.state.file.trim().is_empty() {
            issue("state.file", "state file path is required".into());
        }
        let level = self.logging.level.to_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            issue(
                "logging.level",
                format!("unknown log level {:?}", self.logging.level),
            );
        }
        if self.advanced.max_file_size_gb < 1 {
            issue("advanced.max_file_size_gb", "must be at least 1".into());
        }
        if self.advanced.chunk_size_bytes < 1024 {
            issue(
                "advanced.chunk_size_bytes",
                format!("must be at least 1024 bytes, got {}", self.advanced.chunk_size_bytes),
            );
        }

        issues
    }

    /// Maps this configuration onto the engine's `SyncConfig`.
    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        let retry = RetryPolicy::new(self.retry.max_retries)
            .with_initial_delay(Duration::from_secs(self.retry.initial_delay))
            .with_backoff_multiplier(self.retry.backoff_multiplier)
            .with_max_delay(Duration::from_secs(self.retry.max_delay));

        let mut config = SyncConfig::new(&self.source.prefix, &self.destination.prefix)
            .with_suffix(&self.source.suffix)
            .with_max_concurrent_transfers(self.agent.max_concurrent_transfers)
            .with_lookback_days(self.agent.lookback_days)
            .with_chunk_size(self.advanced.chunk_size_bytes)
            .with_dry_run(self.advanced.dry_run)
            .with_validate_checksum(self.advanced.validate_checksum)
            .with_retention_days(self.state.retention_days)
            .with_retry(retry);

        if self.advanced.validate_file_size {
            config = config.with_max_file_size(self.advanced.max_file_size_gb * 1024 * 1024 * 1024);
        }

        config
    }

    /// Returns the scheduler poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.agent.poll_interval)
    }

    /// Returns the state snapshot path.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(&self.state.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
source:
  root: /var/data/export
  prefix: "reports/"
  suffix: ".csv.gz"
destination:
  root: /var/data/mirror
  prefix: "mirrored"
agent:
  poll_interval: 300
  lookback_days: 7
  max_concurrent_transfers: 4
retry:
  max_retries: 2
  initial_delay: 1
  backoff_multiplier: 3.0
  max_delay: 60
state:
  file: /var/lib/objsync/state.json
  retention_days: 14
logging:
  level: debug
advanced:
  validate_file_size: true
  max_file_size_gb: 2
  chunk_size_bytes: 65536
  validate_checksum: false
  dry_run: true
"#;

    #[test]
    fn full_config_parses() {
        let config: AgentConfig = serde_yaml::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.source.root, "/var/data/export");
        assert_eq!(config.source.prefix, "reports/");
        assert_eq!(config.destination.prefix, "mirrored");
        assert_eq!(config.agent.poll_interval, 300);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.state.retention_days, 14);
        assert_eq!(config.logging.level, "debug");
        assert!(config.advanced.dry_run);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AgentConfig = serde_yaml::from_str(
            "source:\n  root: /src\ndestination:\n  root: /dst\n",
        )
        .unwrap();

        assert_eq!(config.source.suffix, ".csv.gz");
        assert_eq!(config.agent.poll_interval, 600);
        assert_eq!(config.agent.max_concurrent_transfers, 3);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.state.file, "./state/state.json");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn validation_reports_every_problem() {
        let config: AgentConfig = serde_yaml::from_str(
            "agent:\n  poll_interval: 10\n  max_concurrent_transfers: 0\nadvanced:\n  chunk_size_bytes: 16\n",
        )
        .unwrap();

        let issues = config.validate();
        let fields: Vec<&str> = issues.iter().map(|i| i.field).collect();
        assert!(fields.contains(&"source.root"));
        assert!(!fields.contains(&"logging.level"));
        assert!(fields.contains(&"destination.root"));
        assert!(fields.contains(&"agent.poll_interval"));
        assert!(fields.contains(&"agent.max_concurrent_transfers"));
        assert!(fields.contains(&"advanced.chunk_size_bytes"));
    }

    #[test]
    fn sync_config_mapping() {
        let config: AgentConfig = serde_yaml::from_str(FULL_CONFIG).unwrap();
        let sync = config.sync_config();

        assert_eq!(sync.source_prefix, "reports/");
        assert_eq!(sync.destination_prefix, "mirrored");
        assert_eq!(sync.max_concurrent_transfers, 4);
        assert_eq!(sync.lookback_days, 7);
        assert_eq!(sync.chunk_size, 65536);
        assert_eq!(sync.max_file_size, Some(2 * 1024 * 1024 * 1024));
        assert_eq!(sync.retention_days, 14);
        assert!(sync.dry_run);
        assert!(!sync.validate_checksum);
        assert_eq!(sync.retry.max_retries, 2);
        assert_eq!(sync.retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let config: AgentConfig = serde_yaml::from_str(
            "source:\n  root: /src\ndestination:\n  root: /dst\nlogging:\n  level: chatty\n",
        )
        .unwrap();

        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "logging.level");
    }

    #[test]
    fn size_guard_can_be_disabled() {
        let config: AgentConfig = serde_yaml::from_str(
            "source:\n  root: /src\ndestination:\n  root: /dst\nadvanced:\n  validate_file_size: false\n",
        )
        .unwrap();

        assert_eq!(config.sync_config().max_file_size, None);
    }

    #[test]
    fn load_rejects_missing_and_empty_files() {
        let temp = tempfile::tempdir().unwrap();

        let missing = AgentConfig::load(&temp.path().join("nope.yaml"));
        assert!(matches!(missing, Err(ConfigError::NotFound { .. })));

        let empty_path = temp.path().join("empty.yaml");
        fs::write(&empty_path, "   \n").unwrap();
        let empty = AgentConfig::load(&empty_path);
        assert!(matches!(empty, Err(ConfigError::Empty { .. })));
    }
}
