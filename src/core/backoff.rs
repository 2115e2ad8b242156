//! Consecutive-failure accounting and linear backoff for communication errors.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Process-wide consecutive communication-failure counter.
///
/// Lock-free; shared between the execution loop and stats readers.
#[derive(Debug, Default)]
pub struct FailureCounter {
    consecutive: AtomicU32,
}

impl FailureCounter {
    /// Create a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            consecutive: AtomicU32::new(0),
        }
    }

    /// Record one more communication failure and return the new count.
    pub fn record_failure(&self) -> u32 {
        self.consecutive
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Reset after any success.
    pub fn reset(&self) {
        self.consecutive.store(0, Ordering::Release);
    }

    /// Current consecutive failure count.
    pub fn current(&self) -> u32 {
        self.consecutive.load(Ordering::Acquire)
    }
}

/// Backoff for the `n`th consecutive failure: `min(base * n, cap)`.
#[must_use]
pub fn backoff_delay(consecutive_failures: u32, base: Duration, cap: Duration) -> Duration {
    base.checked_mul(consecutive_failures)
        .map_or(cap, |delay| delay.min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(30_000);
    const CAP: Duration = Duration::from_millis(300_000);

    #[test]
    fn test_backoff_is_linear_until_cap() {
        assert_eq!(backoff_delay(1, BASE, CAP), Duration::from_secs(30));
        assert_eq!(backoff_delay(2, BASE, CAP), Duration::from_secs(60));
        assert_eq!(backoff_delay(10, BASE, CAP), Duration::from_secs(300));
        assert_eq!(backoff_delay(11, BASE, CAP), Duration::from_secs(300));
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let mut previous = Duration::ZERO;
        for n in 0..50 {
            let delay = backoff_delay(n, BASE, CAP);
            assert!(delay >= previous);
            assert!(delay <= CAP);
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_overflow_saturates_to_cap() {
        assert_eq!(backoff_delay(u32::MAX, Duration::MAX, CAP), CAP);
    }

    #[test]
    fn test_counter_reset() {
        let counter = FailureCounter::new();
        assert_eq!(counter.record_failure(), 1);
        assert_eq!(counter.record_failure(), 2);
        counter.reset();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.record_failure(), 1);
    }
}
