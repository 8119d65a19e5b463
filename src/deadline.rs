//! Monotonic deadlines for burn phases
//!
//! Durations are measured on `Instant`, which never moves with NTP or manual
//! clock changes. Wall-clock time only shows up in phase timestamps.

use std::time::{Duration, Instant};

/// Absolute instant after which a burn phase is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `duration` after `now`
    pub fn after(now: Instant, duration: Duration) -> Self {
        Deadline(now + duration)
    }

    /// Deadline `duration` from the current instant
    pub fn from_now(duration: Duration) -> Self {
        Self::after(Instant::now(), duration)
    }

    #[inline]
    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left until the deadline, zero once it has passed
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_zero_duration_has_passed() {
        let deadline = Deadline::from_now(Duration::ZERO);
        assert!(deadline.has_passed());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_after_is_relative_to_given_instant() {
        let now = Instant::now();
        let deadline = Deadline::after(now, Duration::from_millis(1500));
        assert_eq!(deadline.0 - now, Duration::from_millis(1500));
    }

    #[test]
    fn test_passes_after_sleep() {
        let deadline = Deadline::from_now(Duration::from_millis(30));
        assert!(!deadline.has_passed());
        assert!(deadline.remaining() <= Duration::from_millis(30));

        thread::sleep(Duration::from_millis(40));
        assert!(deadline.has_passed());
    }
}
