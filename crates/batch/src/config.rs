//! Batch run configuration

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Allowed number of concurrent workers
pub const CONCURRENCY_RANGE: RangeInclusive<usize> = 1..=5;

/// Allowed per-worker request interval in milliseconds
pub const INTERVAL_MS_RANGE: RangeInclusive<u64> = 100..=10_000;

/// Allowed retries per task
pub const RETRY_COUNT_RANGE: RangeInclusive<u32> = 0..=5;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Concurrency outside [`CONCURRENCY_RANGE`]
    #[error("concurrency must be between 1 and 5, got {0}")]
    Concurrency(usize),

    /// Interval outside [`INTERVAL_MS_RANGE`]
    #[error("interval must be between 100 and 10000 ms, got {0} ms")]
    Interval(u64),

    /// Retry count outside [`RETRY_COUNT_RANGE`]
    #[error("retry count must be between 0 and 5, got {0}")]
    RetryCount(u32),
}

/// Validated configuration of one batch run
///
/// Fields are private so every instance satisfies the range invariants;
/// build one with [`BatchConfig::new`] or start from the default and use
/// the clamping `with_*` setters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ulist_batch::BatchConfig;
///
/// let config = BatchConfig::new(3, Duration::from_millis(250), 1).unwrap();
/// assert_eq!(config.concurrency(), 3);
///
/// assert!(BatchConfig::new(0, Duration::from_millis(250), 1).is_err());
///
/// // Setters clamp instead of failing
/// let config = BatchConfig::default().with_concurrency(50);
/// assert_eq!(config.concurrency(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBatchConfig", into = "RawBatchConfig")]
pub struct BatchConfig {
    concurrency: usize,
    interval: Duration,
    retry_count: u32,
}

impl Default for BatchConfig {
    /// One worker, 500 ms between requests, two retries
    fn default() -> Self {
        Self {
            concurrency: 1,
            interval: Duration::from_millis(500),
            retry_count: 2,
        }
    }
}

impl BatchConfig {
    /// Create a configuration, rejecting out-of-range values
    pub fn new(
        concurrency: usize,
        interval: Duration,
        retry_count: u32,
    ) -> Result<Self, ConfigError> {
        if !CONCURRENCY_RANGE.contains(&concurrency) {
            return Err(ConfigError::Concurrency(concurrency));
        }
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        if !INTERVAL_MS_RANGE.contains(&interval_ms) {
            return Err(ConfigError::Interval(interval_ms));
        }
        if !RETRY_COUNT_RANGE.contains(&retry_count) {
            return Err(ConfigError::RetryCount(retry_count));
        }

        Ok(Self {
            concurrency,
            interval,
            retry_count,
        })
    }

    /// Set the worker count, clamped into range
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(*CONCURRENCY_RANGE.start(), *CONCURRENCY_RANGE.end());
        self
    }

    /// Set the per-worker interval in milliseconds, clamped into range
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        let ms = interval_ms.clamp(*INTERVAL_MS_RANGE.start(), *INTERVAL_MS_RANGE.end());
        self.interval = Duration::from_millis(ms);
        self
    }

    /// Set the retry count, clamped into range
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.min(*RETRY_COUNT_RANGE.end());
        self
    }

    /// Number of concurrent workers
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Minimum gap between one worker's requests
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum retries per task
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Retry policy implied by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count)
    }
}

/// Wire form of [`BatchConfig`], validated on the way in
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawBatchConfig {
    concurrency: usize,
    interval_ms: u64,
    retry_count: u32,
}

impl TryFrom<RawBatchConfig> for BatchConfig {
    type Error = ConfigError;

    fn try_from(raw: RawBatchConfig) -> Result<Self, Self::Error> {
        Self::new(
            raw.concurrency,
            Duration::from_millis(raw.interval_ms),
            raw.retry_count,
        )
    }
}

impl From<BatchConfig> for RawBatchConfig {
    fn from(config: BatchConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            interval_ms: config.interval.as_millis() as u64,
            retry_count: config.retry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.interval(), Duration::from_millis(500));
        assert_eq!(config.retry_count(), 2);
    }

    #[test]
    fn test_new_accepts_bounds() {
        assert!(BatchConfig::new(1, Duration::from_millis(100), 0).is_ok());
        assert!(BatchConfig::new(5, Duration::from_millis(10_000), 5).is_ok());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(
            BatchConfig::new(0, Duration::from_millis(500), 2),
            Err(ConfigError::Concurrency(0))
        );
        assert_eq!(
            BatchConfig::new(6, Duration::from_millis(500), 2),
            Err(ConfigError::Concurrency(6))
        );
        assert_eq!(
            BatchConfig::new(1, Duration::from_millis(99), 2),
            Err(ConfigError::Interval(99))
        );
        assert_eq!(
            BatchConfig::new(1, Duration::from_millis(10_001), 2),
            Err(ConfigError::Interval(10_001))
        );
        assert_eq!(
            BatchConfig::new(1, Duration::from_millis(500), 6),
            Err(ConfigError::RetryCount(6))
        );
    }

    #[test]
    fn test_setters_clamp() {
        let config = BatchConfig::default()
            .with_concurrency(0)
            .with_interval_ms(50_000)
            .with_retry_count(9);

        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.interval(), Duration::from_millis(10_000));
        assert_eq!(config.retry_count(), 5);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = BatchConfig::default().with_retry_count(4);
        assert_eq!(config.retry_policy(), RetryPolicy::new(4));
    }

    #[test]
    fn test_serialization() {
        let config = BatchConfig::new(3, Duration::from_millis(250), 1).unwrap();

        let json = serde_json::to_value(config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"concurrency": 3, "interval_ms": 250, "retry_count": 1})
        );

        let parsed: BatchConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_deserialization_validates() {
        let result = serde_json::from_str::<BatchConfig>(
            r#"{"concurrency": 9, "interval_ms": 250, "retry_count": 1}"#,
        );
        assert!(result.is_err());
    }
}
