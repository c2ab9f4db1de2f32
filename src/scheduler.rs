//! Fixed-period cycle scheduler.
//!
//! Drives [`AppService::run_cycle`] once per configured period and owns the
//! shutdown handling.
//!
//! ```text
//!  deadline₀          deadline₁          deadline₂
//!     │── work ──│sleep│── work ──│ sleep │── work ...
//!     ▼                ▼                  ▼
//!   cycle 1          cycle 2            cycle 3
//! ```
//!
//! Deadlines are anchored: `deadlineₙ₊₁ = deadlineₙ + period`, so jitter in
//! the work time never accumulates.  A tick that overruns its slot is
//! followed immediately by the next one.  When a tick overruns by a whole
//! period or more, the deadline is re-anchored to "now" and the missed
//! ticks are skipped rather than replayed in a burst.
//!
//! A shutdown request is honoured between cycles, never in the middle of
//! one, and always ends with every pump commanded off.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::app::ports::{Clock, DataLogger, EventSink, PumpActuator, SensorReader};
use crate::app::service::AppService;

// ═══════════════════════════════════════════════════════════════
//  Shutdown signal
// ═══════════════════════════════════════════════════════════════

/// Cloneable shutdown token shared between the signal handler and the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the current cycle.  Wakes any sleeper.
    pub fn request(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout` or until shutdown is requested.
    /// Returns whether shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tick planning
// ═══════════════════════════════════════════════════════════════

/// When the next tick should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    /// How long to sleep before the next tick.  Zero when late.
    pub sleep: Duration,
    /// Deadline of the next tick.
    pub deadline: Instant,
    /// How far past its deadline the next tick already is, if at all.
    pub late_by: Option<Duration>,
}

/// Plan the tick after the one scheduled at `deadline`, given the time
/// `now` at which its work finished.
pub fn plan_next_tick(deadline: Instant, period: Duration, now: Instant) -> TickPlan {
    let next = deadline + period;
    if now <= next {
        return TickPlan {
            sleep: next - now,
            deadline: next,
            late_by: None,
        };
    }

    let late = now - next;
    TickPlan {
        sleep: Duration::ZERO,
        // Re-anchor instead of replaying missed ticks.
        deadline: if late >= period { now } else { next },
        late_by: Some(late),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub overruns: u64,
    /// The final all-off command was confirmed by the actuator.
    pub pumps_confirmed_off: bool,
}

/// Runs the control loop at a fixed period until shutdown.
pub struct CycleScheduler<C> {
    clock: C,
    period: Duration,
    shutdown: ShutdownSignal,
    max_cycles: Option<u64>,
}

impl<C: Clock> CycleScheduler<C> {
    pub fn new(clock: C, period: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            clock,
            period,
            shutdown,
            max_cycles: None,
        }
    }

    /// Stop on its own after `cycles` cycles.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run cycles until shutdown is requested (or the cycle limit is hit),
    /// then stop every pump.
    ///
    /// Per tick: poll → `dt` since the previous tick → step → apply → log,
    /// all inside [`AppService::run_cycle`].
    pub fn run(
        &mut self,
        app: &mut AppService,
        hw: &mut (impl SensorReader + PumpActuator),
        datalog: &mut impl DataLogger,
        sink: &mut impl EventSink,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut deadline = self.clock.now();
        let mut last_tick: Option<Instant> = None;

        info!("Scheduler running, period {} ms", self.period.as_millis());

        while !self.shutdown.is_requested() && !self.limit_reached(stats.cycles) {
            let tick_start = self.clock.now();
            let dt = last_tick.map_or(Duration::ZERO, |t| tick_start.saturating_duration_since(t));
            last_tick = Some(tick_start);

            let wall = self.clock.wall_time();
            app.run_cycle(dt, wall, hw, datalog, sink);
            stats.cycles += 1;

            if self.shutdown.is_requested() || self.limit_reached(stats.cycles) {
                break;
            }

            let plan = plan_next_tick(deadline, self.period, self.clock.now());
            if let Some(late) = plan.late_by {
                let skipped = late.as_nanos() / self.period.as_nanos().max(1);
                warn!(
                    "Cycle {} overran its period by {} ms ({} missed ticks skipped)",
                    stats.cycles,
                    late.as_millis(),
                    skipped
                );
                stats.overruns += 1;
                app.record_overrun(late);
            }
            deadline = plan.deadline;

            if !plan.sleep.is_zero() {
                self.clock.sleep(plan.sleep, &self.shutdown);
            }
        }

        if self.shutdown.is_requested() {
            info!("Shutdown requested after {} cycles", stats.cycles);
        }
        stats.pumps_confirmed_off = app.shutdown(hw, sink);
        stats
    }

    fn limit_reached(&self, cycles: u64) -> bool {
        self.max_cycles.is_some_and(|max| cycles >= max)
    }
}
