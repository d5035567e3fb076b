//! Millisecond clock sources for record timestamps and upsert versions
//!
//! Versions are derived from wall-clock milliseconds, so the clock must never
//! hand out a smaller value than it did before. `SystemClock` keeps a
//! high-water mark to enforce that; `ManualClock` is driven by tests.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock that never goes backward.
#[derive(Debug, Default)]
pub struct SystemClock {
    high_water_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    /// If the wall clock has gone backward (e.g. NTP adjustment), returns the
    /// previous high-water mark instead.
    fn now_millis(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let prev = self.high_water_ms.fetch_max(wall, Ordering::AcqRel);
        wall.max(prev)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
    step_ms: i64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
            step_ms: 0,
        }
    }

    /// Advances by `step_ms` after every read.
    pub fn stepping(start_ms: i64, step_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
            step_ms,
        }
    }

    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_ms.fetch_add(self.step_ms, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let mut prev = clock.now_millis();
        for _ in 0..1000 {
            let ts = clock.now_millis();
            assert!(ts >= prev, "clock went backward: {} < {}", ts, prev);
            prev = ts;
        }
    }

    #[test]
    fn test_system_clock_holds_high_water_mark() {
        let clock = SystemClock::new();
        let future = Utc::now().timestamp_millis() + 60_000;
        clock.high_water_ms.store(future, Ordering::Release);
        assert_eq!(clock.now_millis(), future);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(5);
        assert_eq!(clock.now_millis(), 1_005);
        clock.set(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_stepping_clock() {
        let clock = ManualClock::stepping(100, 10);
        assert_eq!(clock.now_millis(), 100);
        assert_eq!(clock.now_millis(), 110);
        assert_eq!(clock.now_millis(), 120);
    }
}
