//! Unified error types for the solar-thermal controller.
//!
//! One small error type per subsystem.  All of them are `Copy` so they can
//! be passed through the safety supervisor, the diagnostics ring and the
//! event sink without allocation.
//!
//! Only [`ConfigError`] is fatal, and only at startup.  Everything else is
//! absorbed by the control cycle.

use core::fmt;
use std::io;

use crate::fsm::context::Pump;
use crate::sensors::SensorId;

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// Device file missing or unreadable (sensor dropped off the bus).
    NoResponse,
    /// The read did not complete within the per-sensor timeout.
    Timeout,
    /// Record ended before both lines were present (read past end of device).
    Truncated,
    /// Record present but not in the expected `crc=` / `t=` layout.
    Malformed,
    /// The bus driver reported a CRC mismatch (`crc=.. NO`).
    CrcMismatch,
    /// The 85000 power-on reset value: no conversion has happened yet.
    PowerOnReset,
    /// The −1 sentinel: the conversion failed.
    ConversionFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::Timeout => write!(f, "read timed out"),
            Self::Truncated => write!(f, "truncated record"),
            Self::Malformed => write!(f, "malformed record"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::PowerOnReset => write!(f, "power-on reset value"),
            Self::ConversionFailed => write!(f, "conversion failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

/// Reasons a snapshot cannot support a control decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCriticalFault {
    /// Both redundant collector-pipe sensors are faulted.
    CollectorPipesLost,
    /// The tank-bottom reference sensor is faulted.
    TankBottomLost,
}

impl fmt::Display for SensorCriticalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectorPipesLost => write!(f, "both collector pipe sensors lost"),
            Self::TankBottomLost => write!(f, "tank bottom sensor lost"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Writing the output line of a pump failed.
    GpioWriteFailed(Pump),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed(pump) => write!(f, "GPIO write failed for {pump} pump"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data-log errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingError {
    /// A new log file (or its directory) could not be created.
    CreateFailed(io::ErrorKind),
    /// Appending a record to the current file failed.
    WriteFailed(io::ErrorKind),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFailed(kind) => write!(f, "log file create failed ({kind})"),
            Self::WriteFailed(kind) => write!(f, "log write failed ({kind})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file at the given path.
    NotFound,
    /// The file exists but is not valid JSON for [`SystemConfig`](crate::config::SystemConfig).
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error while reading the file.
    IoError(io::ErrorKind),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(kind) => write!(f, "I/O error ({kind})"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Faults tracked by the safety supervisor.  They are accumulated in a
/// bitfield so that several simultaneous faults can be raised and cleared
/// individually.  Only [`SafetyFault::CriticalSensorLoss`] changes pump
/// behaviour; the rest are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    CollectorPipe1 = 0b0000_0001,
    CollectorPipe2 = 0b0000_0010,
    CollectorAir = 0b0000_0100,
    TankBottom = 0b0000_1000,
    TankTop = 0b0001_0000,
    /// Snapshot too incomplete for a decision; pumps forced off.
    CriticalSensorLoss = 0b0010_0000,
    /// Last pump command could not be confirmed.
    ActuatorUnconfirmed = 0b0100_0000,
    /// Data logging is dropping records.
    LoggingDegraded = 0b1000_0000,
}

impl SafetyFault {
    pub const ALL: [SafetyFault; 8] = [
        Self::CollectorPipe1,
        Self::CollectorPipe2,
        Self::CollectorAir,
        Self::TankBottom,
        Self::TankTop,
        Self::CriticalSensorLoss,
        Self::ActuatorUnconfirmed,
        Self::LoggingDegraded,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    /// The per-sensor fault bit.
    pub const fn for_sensor(sensor: SensorId) -> Self {
        match sensor {
            SensorId::CollectorPipe1 => Self::CollectorPipe1,
            SensorId::CollectorPipe2 => Self::CollectorPipe2,
            SensorId::CollectorAir => Self::CollectorAir,
            SensorId::TankBottom => Self::TankBottom,
            SensorId::TankTop => Self::TankTop,
        }
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollectorPipe1 => write!(f, "collector pipe 1 sensor faulted"),
            Self::CollectorPipe2 => write!(f, "collector pipe 2 sensor faulted"),
            Self::CollectorAir => write!(f, "collector air sensor faulted"),
            Self::TankBottom => write!(f, "tank bottom sensor faulted"),
            Self::TankTop => write!(f, "tank top sensor faulted"),
            Self::CriticalSensorLoss => write!(f, "critical sensor loss"),
            Self::ActuatorUnconfirmed => write!(f, "pump command unconfirmed"),
            Self::LoggingDegraded => write!(f, "data logging degraded"),
        }
    }
}
