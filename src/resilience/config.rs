//! Configuration for the guarded writer.

use std::time::Duration;

use crate::error::BreakerConfigError;

/// Settings for one named guarded command: timeout, bulkhead size, and the
/// breaker trip policy.
///
/// Defaults match the values the service was tuned with:
/// 5 s timeout, 10 concurrent calls, trip after 10 requests with more than
/// 50 % errors, 1 s sleep window, and a 10 s rolling window in 10 buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Command name, used in logs and rejection errors.
    pub name: String,
    /// How long a caller waits for the write before it is abandoned.
    pub timeout: Duration,
    /// Bulkhead size: maximum number of writes in flight.
    pub max_concurrent: usize,
    /// Minimum requests in the rolling window before the breaker may trip.
    pub volume_threshold: u64,
    /// Time the breaker stays open before admitting a trial.
    pub sleep_window: Duration,
    /// Error percentage (0–100) that must be exceeded to trip.
    pub error_percent_threshold: u32,
    /// Length of the trailing window the counters cover.
    pub rolling_window: Duration,
    /// Number of buckets the rolling window is divided into.
    pub rolling_buckets: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "upsert_cassandra".to_string(),
            timeout: Duration::from_millis(5_000),
            max_concurrent: 10,
            volume_threshold: 10,
            sleep_window: Duration::from_millis(1_000),
            error_percent_threshold: 50,
            rolling_window: Duration::from_millis(10_000),
            rolling_buckets: 10,
        }
    }
}

impl BreakerConfig {
    /// Duration covered by a single rolling bucket.
    #[must_use]
    pub fn bucket_width(&self) -> Duration {
        self.rolling_window / self.rolling_buckets.max(1)
    }

    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns the [`BreakerConfigError`] for the first invalid field.
    pub fn validate(&self) -> Result<(), BreakerConfigError> {
        if self.max_concurrent == 0 {
            return Err(BreakerConfigError::NoConcurrency);
        }
        if self.rolling_buckets == 0 {
            return Err(BreakerConfigError::NoBuckets);
        }
        if self.bucket_width().is_zero() {
            return Err(BreakerConfigError::WindowTooShort {
                window: self.rolling_window,
                buckets: self.rolling_buckets,
            });
        }
        if self.error_percent_threshold > 100 {
            return Err(BreakerConfigError::ErrorPercent(self.error_percent_threshold));
        }
        if self.timeout.is_zero() {
            return Err(BreakerConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
