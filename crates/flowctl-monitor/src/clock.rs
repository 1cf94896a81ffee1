// crates/flowctl-monitor/src/clock.rs
// ============================================================================
// Module: Flowctl Clock
// Description: Caller-supplied wall-clock access for audit timestamps.
// Purpose: Keep time reads at the edge, substitutable in tests, rather than
//   letting every layer call `SystemTime::now()` directly.
// Dependencies: std::time
// ============================================================================

//! ## Overview
//! Mirrors the pattern of treating time as an explicit input rather than an
//! ambient capability: production code reads the wall clock exactly once,
//! at the [`SystemClock`] boundary, and everything downstream receives a
//! plain `i64` millisecond value.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Supplies the current time for audit-event timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// A [`Clock`] backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
/// A fixed [`Clock`] for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_positive_millis() {
        assert!(SystemClock.now_millis() > 0);
    }

    #[test]
    fn fixed_clock_returns_fixed_value() {
        assert_eq!(FixedClock(42).now_millis(), 42);
    }
}
