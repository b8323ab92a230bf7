//! Exponential backoff for tenants whose last cycle hit a transient failure.

use backoff::backoff::Backoff as _;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::{Duration, Instant};

/// Backoff window for one tenant.
///
/// Delays come from [`ExponentialBackoff`] without jitter and without an
/// elapsed-time limit; this type only remembers when the next attempt is due.
#[derive(Debug, Clone)]
pub struct Backoff {
    schedule: ExponentialBackoff,
    cap: Duration,
    failures: u32,
    retry_at: Option<Instant>,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, factor: u32, cap: Duration) -> Self {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(base)
            .with_multiplier(f64::from(factor.max(1)))
            .with_randomization_factor(0.0)
            .with_max_interval(cap)
            .with_max_elapsed_time(None)
            .build();
        Self {
            schedule,
            cap,
            failures: 0,
            retry_at: None,
        }
    }

    /// Register a failure at `now` and return the new delay.
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.schedule.next_backoff().unwrap_or(self.cap).min(self.cap);
        self.retry_at = Some(now + delay);
        delay
    }

    pub fn reset(&mut self) {
        self.schedule.reset();
        self.failures = 0;
        self.retry_at = None;
    }

    /// Time left before another attempt is allowed, `None` if allowed now.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.retry_at
            .and_then(|at| at.checked_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_secs(2), 2, Duration::from_secs(300))
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let mut b = backoff();
        let now = Instant::now();
        let delays: Vec<u64> = (0..10).map(|_| b.record_failure(now).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 64, 128, 256, 300, 300]);
        assert_eq!(b.failures(), 10);
    }

    #[test]
    fn test_window_and_reset() {
        let mut b = backoff();
        let now = Instant::now();
        assert!(b.remaining(now).is_none());

        b.record_failure(now);
        assert_eq!(b.remaining(now).map(|d| d.as_secs()), Some(2));
        assert!(b.remaining(now + Duration::from_secs(3)).is_none());

        b.record_failure(now);
        assert_eq!(b.failures(), 2);
        assert_eq!(b.remaining(now).map(|d| d.as_secs()), Some(4));

        b.reset();
        assert!(b.remaining(now).is_none());
        assert_eq!(b.failures(), 0);

        // the schedule starts over after a reset
        assert_eq!(b.record_failure(now).as_secs(), 2);
    }

    #[test]
    fn test_factor_one_keeps_base_delay() {
        let mut b = Backoff::new(Duration::from_secs(5), 1, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..4 {
            assert_eq!(b.record_failure(now).as_secs(), 5);
        }
    }
}
