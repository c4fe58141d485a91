//! Monotonic clocks and the per-collection deadline.
//!
//! A [`Deadline`] is armed when a collection starts and lives exactly as long
//! as that collection: it is a plain value owned by the call, so it cannot
//! outlive it or leak into the next one. Expiry is checked cooperatively,
//! once per draw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic time since an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Time moves only through [`ManualClock::advance`], plus an optional fixed
/// step applied after every reading.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    step_nanos: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that moves forward by `step` each time it is read.
    pub fn stepping(step: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(0),
            step_nanos: step.as_nanos() as u64,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.step_nanos, Ordering::SeqCst))
    }
}

/// Wall-clock budget for one collection call.
pub struct Deadline<'a> {
    clock: &'a dyn Clock,
    started: Duration,
    limit: Duration,
}

impl<'a> Deadline<'a> {
    /// Arm a deadline `limit` from now.
    pub fn arm(clock: &'a dyn Clock, limit: Duration) -> Self {
        Self {
            started: clock.now(),
            clock,
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }

    /// True once the budget is used up. A zero budget is expired immediately.
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_stepping_clock_advances_per_read() {
        let clock = ManualClock::stepping(Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(20));
    }

    #[test]
    fn test_zero_limit_is_expired_immediately() {
        let clock = ManualClock::new();
        let deadline = Deadline::arm(&clock, Duration::ZERO);
        assert!(deadline.expired());
    }

    #[test]
    fn test_deadline_expires_after_limit() {
        let clock = ManualClock::new();
        let deadline = Deadline::arm(&clock, Duration::from_secs(5));
        assert!(!deadline.expired());
        clock.advance(Duration::from_secs(4));
        assert!(!deadline.expired());
        clock.advance(Duration::from_secs(1));
        assert!(deadline.expired());
        assert_eq!(deadline.limit(), Duration::from_secs(5));
    }

    #[test]
    fn test_deadline_measures_from_arming() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(100));
        let deadline = Deadline::arm(&clock, Duration::from_secs(1));
        assert_eq!(deadline.elapsed(), Duration::ZERO);
        assert!(!deadline.expired());
    }
}
