//! Retry policy value passed into the request executor.

use std::time::Duration;

/// Bounded exponential backoff: the delay after failed attempt `i`
/// (0-based) is `min(base_delay * 2^i, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_tries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_tries: max_tries.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff before the attempt that follows failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        // 2^31 seconds is already far beyond any sane cap.
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Sum of the delays slept when the first `failures` attempts fail.
    pub fn total_delay(&self, failures: u32) -> Duration {
        (0..failures).map(|i| self.delay_after(i)).sum()
    }
}
