//! Configuration for sync passes.

use std::time::Duration;

/// Retry and backoff policy for a single transfer attempt sequence.
///
/// The delay is a pure function of the attempt number: no jitter, no
/// dependence on the error kind. Attempt numbering starts at 1 for the
/// first retry after an initial failure, so a transfer makes up to
/// `max_retries + 1` tries in total.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied per further retry.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given retry budget and default timing.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the upper bound on any single delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Returns true if retry `attempt` (1-based) is within budget.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Calculates the delay before retry `attempt` (1-based):
    /// `min(initial_delay * backoff_multiplier^(attempt-1), max_delay)`.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for the orchestrator and transfer executor.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Source listing prefix.
    pub source_prefix: String,
    /// Prefix prepended to every destination key.
    pub destination_prefix: String,
    /// Accepted object suffix; matched case-insensitively.
    pub suffix: String,
    /// Size of the transfer worker pool.
    pub max_concurrent_transfers: usize,
    /// Only consider objects created within this many days; 0 = unbounded.
    pub lookback_days: u32,
    /// Objects larger than this fail without a transfer attempt.
    pub max_file_size: Option<u64>,
    /// Streaming buffer size in bytes.
    pub chunk_size: usize,
    /// Read the source but skip every destination write and state update.
    pub dry_run: bool,
    /// Compare the streamed checksum against destination metadata.
    pub validate_checksum: bool,
    /// Expire state records after this many days; 0 = never.
    pub retention_days: u32,
    /// Retry policy for individual transfers.
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Creates a configuration with default tuning.
    #[must_use]
    pub fn new(source_prefix: impl Into<String>, destination_prefix: impl Into<String>) -> Self {
        Self {
            source_prefix: source_prefix.into(),
            destination_prefix: destination_prefix.into(),
            suffix: ".csv.gz".to_string(),
            max_concurrent_transfers: 3,
            lookback_days: 0,
            max_file_size: None,
            chunk_size: 8 * 1024 * 1024,
            dry_run: false,
            validate_checksum: true,
            retention_days: 30,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the accepted object suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrent_transfers(mut self, workers: usize) -> Self {
        self.max_concurrent_transfers = workers;
        self
    }

    /// Sets the lookback window in days.
    #[must_use]
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Sets the maximum accepted object size in bytes.
    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Sets the streaming buffer size.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables or disables the streaming checksum comparison.
    #[must_use]
    pub fn with_validate_checksum(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Sets the state retention window in days.
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_backoff() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_secs(5))
            .with_backoff_multiplier(2.0)
            .with_max_delay(Duration::from_secs(300));

        assert_eq!(policy.next_delay(1), Duration::from_secs(5));
        assert_eq!(policy.next_delay(2), Duration::from_secs(10));
        assert_eq!(policy.next_delay(3), Duration::from_secs(20));
        assert_eq!(policy.next_delay(4), Duration::from_secs(40));
    }

    #[test]
    fn retry_delay_respects_max() {
        let policy = RetryPolicy::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(10.0)
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(5));
        assert_eq!(policy.next_delay(9), Duration::from_secs(5));
    }

    #[test]
    fn retry_budget_boundaries() {
        let policy = RetryPolicy::new(2);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("reports/", "mirrored")
            .with_suffix(".parquet")
            .with_max_concurrent_transfers(8)
            .with_lookback_days(7)
            .with_max_file_size(1024)
            .with_dry_run(true);

        assert_eq!(config.source_prefix, "reports/");
        assert_eq!(config.destination_prefix, "mirrored");
        assert_eq!(config.suffix, ".parquet");
        assert_eq!(config.max_concurrent_transfers, 8);
        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.max_file_size, Some(1024));
        assert!(config.dry_run);
    }
}
