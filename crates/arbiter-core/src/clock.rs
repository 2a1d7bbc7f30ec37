//! Wall-clock abstraction.
//!
//! Trajectory timestamps are absolute seconds since the UNIX epoch, so
//! the arbitration engine needs "now" on the same scale. Injecting the
//! clock lets tests arbitrate fixed scenarios deterministically.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in seconds since the UNIX epoch.
pub trait Clock: Send + Sync {
    /// Current time (s since UNIX epoch).
    fn now(&self) -> f64;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        // A clock set before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800.0);
    }
}
