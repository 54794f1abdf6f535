//! # Interval Timer
//!
//! Fixed-period trigger driven by the host's simulation timestep.
//!
//! ## Design
//!
//! The host owns the clock. Every tick it hands us its fixed `dt`; the timer
//! accumulates it and fires once the period has elapsed. Time is simulation
//! time, so a paused host never triggers a sampling pass.

use std::time::Duration;

/// Accumulating interval trigger.
#[derive(Clone, Debug)]
pub struct IntervalTimer {
    /// Target period; zero fires on every advance.
    period: Duration,
    /// Time accumulated since the last firing.
    accumulator: Duration,
    /// Total firings.
    fire_count: u64,
}

impl IntervalTimer {
    /// Creates a timer with the given period.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            accumulator: Duration::ZERO,
            fire_count: 0,
        }
    }

    /// Advances by one host tick; returns true if the period has elapsed.
    ///
    /// Firing resets the accumulator, so at most one firing happens per
    /// advance no matter how large `dt` is.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.accumulator = self.accumulator.saturating_add(dt);
        if self.accumulator < self.period {
            return false;
        }
        self.accumulator = Duration::ZERO;
        self.fire_count += 1;
        true
    }

    /// Restarts the period without firing.
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }

    /// Returns the configured period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Returns how many times the timer has fired.
    #[must_use]
    pub const fn fire_count(&self) -> u64 {
        self.fire_count
    }
}
