//! Download retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry and timeout settings for a single download.
///
/// The delay after failed attempt `k` (0-indexed) is
/// `initial_delay_ms * backoff_multiplier^k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after every failed attempt.
    pub backoff_multiplier: f64,
    /// Overall time limit of one attempt in milliseconds, including the body transfer.
    pub timeout_ms: u64,
    /// Time limit for connecting and receiving response headers in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// Policy for ordinary batches: 3 retries, 2s doubling, 5 minute limit.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            timeout_ms: 300_000,
            connect_timeout_ms: 30_000,
        }
    }

    /// Policy for large or flaky extracts: 5 retries, 3s growing by 1.5, 10 minute limit.
    pub fn patient() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 3_000,
            backoff_multiplier: 1.5,
            timeout_ms: 600_000,
            connect_timeout_ms: 60_000,
        }
    }

    /// Total number of attempts, first one included.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff to wait after failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis.round() as u64)
        } else {
            Duration::ZERO
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
