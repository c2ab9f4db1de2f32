//! System time adapter.
//!
//! - Monotonic time from `std::time::Instant` (period measurement).
//! - Wall time from `chrono::Local` (data-log timestamps only).
//! - Sleep waits on the [`ShutdownSignal`] so a shutdown request wakes the
//!   scheduler immediately instead of after the rest of the period.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::app::ports::Clock;
use crate::scheduler::ShutdownSignal;

/// [`Clock`] backed by the operating system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since the clock was created (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&mut self, duration: Duration, shutdown: &ShutdownSignal) {
        shutdown.wait_timeout(duration);
    }
}
