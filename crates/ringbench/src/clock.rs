//! Cycle-counter timing for the measurement loops.
//!
//! `minstant` reads the TSC where it is usable and converts cycles with a
//! calibrated frequency; elsewhere it falls back to the OS monotonic clock.

use minstant::Instant;
use std::time::Duration;

/// Measures elapsed time from the moment it is started.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Samples the counter now.
    #[inline]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since [`start`](Self::start).
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Returns true if the cycle counter is the TSC rather than the OS clock.
pub fn cycle_counter_available() -> bool {
    minstant::is_tsc_available()
}
