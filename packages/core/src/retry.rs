//! Exponential backoff with jitter for failed jobs.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff settings used to reschedule a failed job.
///
/// For the Nth failure the delay is `min(max_backoff_seconds,
/// base_backoff_seconds ^ N)`, plus a random jitter in
/// `[0, base_backoff_seconds)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_backoff_seconds: 2,
            max_backoff_seconds: 300,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_backoff_seconds: u64, max_backoff_seconds: u64) -> Self {
        Self {
            base_backoff_seconds,
            max_backoff_seconds,
        }
    }

    /// Capped exponential delay for the given post-increment attempt count.
    pub fn delay_seconds(&self, attempts: u32) -> u64 {
        let exponential = self
            .base_backoff_seconds
            .checked_pow(attempts)
            .unwrap_or(u64::MAX);
        exponential.min(self.max_backoff_seconds)
    }

    /// Random jitter in `[0, base_backoff_seconds)`.
    pub fn jitter_seconds<R: Rng>(&self, rng: &mut R) -> u64 {
        if self.base_backoff_seconds == 0 {
            return 0;
        }
        rng.gen_range(0..self.base_backoff_seconds)
    }

    /// Reschedule time for a job that has just failed for the `attempts`-th time.
    pub fn next_run_after_with<R: Rng>(&self, attempts: u32, now: i64, rng: &mut R) -> i64 {
        let offset = self
            .delay_seconds(attempts)
            .saturating_add(self.jitter_seconds(rng));
        now.saturating_add(i64::try_from(offset).unwrap_or(i64::MAX))
    }

    /// [`RetryPolicy::next_run_after_with`] using the thread-local generator.
    pub fn next_run_after(&self, attempts: u32, now: i64) -> i64 {
        self.next_run_after_with(attempts, now, &mut rand::thread_rng())
    }
}
