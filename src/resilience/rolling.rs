//! Bucketed rolling counters over a trailing time window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    successes: u64,
    failures: u64,
}

impl Bucket {
    fn new(start: Instant) -> Self {
        Self {
            start,
            successes: 0,
            failures: 0,
        }
    }

    fn add(&mut self, failed: bool) {
        if failed {
            self.failures += 1;
        } else {
            self.successes += 1;
        }
    }
}

/// Totals over the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthCounts {
    /// Outcomes recorded in the window.
    pub total: u64,
    /// Failed outcomes recorded in the window.
    pub errors: u64,
}

impl HealthCounts {
    /// Error percentage, rounded down. Zero when nothing was recorded.
    #[must_use]
    pub fn error_percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        u32::try_from(self.errors.saturating_mul(100) / self.total).unwrap_or(100)
    }

    /// Returns `true` when the error rate is strictly above `percent`.
    #[must_use]
    pub fn exceeds(&self, percent: u32) -> bool {
        self.total > 0 && self.errors.saturating_mul(100) > u64::from(percent) * self.total
    }
}

/// Success/failure counts for the trailing `window`, kept in buckets of
/// `window / buckets`. Buckets that fall out of the window are dropped on
/// the next write.
#[derive(Debug)]
pub(crate) struct RollingCounter {
    window: Duration,
    width: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingCounter {
    pub(crate) fn new(window: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);
        Self {
            window,
            width: window / buckets,
            buckets: VecDeque::with_capacity(buckets as usize + 1),
        }
    }

    pub(crate) fn record(&mut self, now: Instant, failed: bool) {
        self.evict(now);
        match self.buckets.back_mut() {
            Some(bucket) if now.duration_since(bucket.start) < self.width => bucket.add(failed),
            _ => {
                let mut bucket = Bucket::new(now);
                bucket.add(failed);
                self.buckets.push_back(bucket);
            }
        }
    }

    pub(crate) fn counts(&self, now: Instant) -> HealthCounts {
        self.buckets
            .iter()
            .filter(|b| now.duration_since(b.start) < self.window)
            .fold(HealthCounts::default(), |acc, b| HealthCounts {
                total: acc.total + b.successes + b.failures,
                errors: acc.errors + b.failures,
            })
    }

    pub(crate) fn reset(&mut self) {
        self.buckets.clear();
    }

    fn evict(&mut self, now: Instant) {
        while self
            .buckets
            .front()
            .is_some_and(|b| now.duration_since(b.start) >= self.window)
        {
            self.buckets.pop_front();
        }
    }
}
