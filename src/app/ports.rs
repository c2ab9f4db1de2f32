//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (one-wire probes, GPIO relays, the CSV log, the wall
//! clock, event sinks) implement these traits.  The
//! [`AppService`](super::service::AppService) and the
//! [`CycleScheduler`](crate::scheduler::CycleScheduler) consume them via
//! generics, so the control core never touches hardware directly.
//!
//! All port errors are typed; callers must handle every variant explicitly.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::error::{ActuatorError, LoggingError, SensorFault};
use crate::fsm::ControlMode;
use crate::fsm::context::{PumpState, TemperatureSnapshot};
use crate::scheduler::ShutdownSignal;
use crate::sensors::SensorId;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this once per sensor per cycle.
pub trait SensorReader {
    /// Read one probe in °C.  Implementations must bound the call with a
    /// timeout and report every failure as a [`SensorFault`].
    fn read(&mut self, sensor: SensorId) -> Result<f32, SensorFault>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// What [`PumpActuator::apply`] did at the physical layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// At least one output line changed level.
    pub changed: bool,
}

/// Write-side port: the domain calls this to command the pumps.
pub trait PumpActuator {
    /// Drive the outputs to `pumps`.  Idempotent: re-applying the current
    /// state writes nothing and reports `changed == false`.
    fn apply(&mut self, pumps: PumpState) -> Result<ApplyReport, ActuatorError>;

    /// Drive every output to "stopped", whatever the cached state says.
    fn all_off(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Data-log port (driven adapter: domain → disk)
// ───────────────────────────────────────────────────────────────

/// Historical record sink.  A failure here never affects control.
pub trait DataLogger {
    fn append(
        &mut self,
        timestamp: DateTime<Local>,
        cycle: u64,
        snapshot: &TemperatureSnapshot,
        pumps: PumpState,
        mode: ControlMode,
    ) -> Result<(), LoggingError>;
}

/// A disabled data log accepts and drops every record.
impl<L: DataLogger> DataLogger for Option<L> {
    fn append(
        &mut self,
        timestamp: DateTime<Local>,
        cycle: u64,
        snapshot: &TemperatureSnapshot,
        pumps: PumpState,
        mode: ControlMode,
    ) -> Result<(), LoggingError> {
        match self {
            Some(log) => log.append(timestamp, cycle, snapshot, pumps, mode),
            None => Ok(()),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: domain ↔ time)
// ───────────────────────────────────────────────────────────────

/// Monotonic time, wall time and an interruptible sleep.
///
/// The scheduler measures periods with [`now`](Clock::now) only;
/// [`wall_time`](Clock::wall_time) is for record timestamps.
pub trait Clock {
    fn now(&self) -> Instant;

    fn wall_time(&self) -> DateTime<Local>;

    /// Sleep for `duration`, returning early once `shutdown` is requested.
    fn sleep(&mut self, duration: Duration, shutdown: &ShutdownSignal);
}
