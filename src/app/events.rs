//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log lines, a test recorder, …).

use crate::error::{ActuatorError, LoggingError, SensorCriticalFault};
use crate::fsm::ControlMode;
use crate::fsm::context::{PumpState, TemperatureSnapshot};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries the initial mode).
    Started(ControlMode),

    /// One control cycle completed.
    Cycle(CycleSummary),

    /// The state machine moved between modes.
    ModeChanged { from: ControlMode, to: ControlMode },

    /// New safety faults were raised (carries the full bitmask).
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// A sensor-critical snapshot forced every pump off.
    FailSafe(SensorCriticalFault),

    /// The pump command could not be applied; retried next cycle.
    ActuatorFault(ActuatorError),

    /// A data-log record was dropped.
    LoggingFault(LoggingError),

    /// Logging works again after a period of dropped records.
    LoggingRecovered,

    /// Pumps stopped and the loop has exited.
    ShutdownComplete { cycles: u64, pumps_confirmed_off: bool },
}

/// Per-cycle telemetry suitable for a log line.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub mode: ControlMode,
    pub snapshot: TemperatureSnapshot,
    /// Commanded outputs.
    pub pumps: PumpState,
    /// The command was confirmed by the actuator.
    pub applied: bool,
    pub fault_flags: u8,
}
