//! Context threaded through every state handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the current temperature snapshot, the commanded pump outputs,
//! the phase timer and the control thresholds.  It is owned by the
//! [`ControlStateMachine`](super::ControlStateMachine) and only mutated
//! inside `step`.

use core::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::ControlConfig;
use crate::error::{SensorCriticalFault, SensorFault};
use crate::sensors::SensorId;

// ---------------------------------------------------------------------------
// Temperature snapshot (read-only to state handlers; built by the aggregator)
// ---------------------------------------------------------------------------

/// One sensor's value for a cycle.
pub type Reading = Result<f32, SensorFault>;

/// A point-in-time snapshot of the five probes, plus the redundancy verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSnapshot {
    /// Indexed by `SensorId as usize`.
    readings: [Reading; SensorId::COUNT],
    /// Collector pipe temperature used for control: the lower of the two
    /// probes, or the surviving one when exactly one is faulted.
    pub pipe_c: Option<f32>,
    /// At least one probe is faulted but a decision is still possible.
    pub degraded: bool,
    /// Set when no safe decision can be made from this snapshot.
    pub critical: Option<SensorCriticalFault>,
}

impl TemperatureSnapshot {
    /// Apply the redundancy policy to one cycle's raw readings.
    pub fn from_readings(readings: [Reading; SensorId::COUNT]) -> Self {
        let p1 = readings[SensorId::CollectorPipe1 as usize].ok();
        let p2 = readings[SensorId::CollectorPipe2 as usize].ok();
        let pipe_c = match (p1, p2) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(t), None) | (None, Some(t)) => Some(t),
            (None, None) => None,
        };

        let critical = if pipe_c.is_none() {
            Some(SensorCriticalFault::CollectorPipesLost)
        } else if readings[SensorId::TankBottom as usize].is_err() {
            Some(SensorCriticalFault::TankBottomLost)
        } else {
            None
        };

        Self {
            readings,
            pipe_c,
            degraded: critical.is_none() && readings.iter().any(Result::is_err),
            critical,
        }
    }

    /// Build a snapshot from plain values (all sensors healthy).
    pub fn from_celsius(pipe_1: f32, pipe_2: f32, air: f32, tank_bottom: f32, tank_top: f32) -> Self {
        Self::from_readings([
            Ok(pipe_1),
            Ok(pipe_2),
            Ok(air),
            Ok(tank_bottom),
            Ok(tank_top),
        ])
    }

    /// Snapshot with every sensor unreadable.
    pub fn all_faulted(fault: SensorFault) -> Self {
        Self::from_readings([Err(fault); SensorId::COUNT])
    }

    pub fn reading(&self, sensor: SensorId) -> Reading {
        self.readings[sensor as usize]
    }

    pub fn tank_bottom_c(&self) -> Option<f32> {
        self.reading(SensorId::TankBottom).ok()
    }

    /// Pipe-over-tank temperature difference, when both sides are known.
    pub fn delta_c(&self) -> Option<f32> {
        Some(self.pipe_c? - self.tank_bottom_c()?)
    }

    /// Every faulted sensor together with its fault.
    pub fn faults(&self) -> impl Iterator<Item = (SensorId, SensorFault)> + '_ {
        SensorId::ALL
            .into_iter()
            .filter_map(|id| self.reading(id).err().map(|f| (id, f)))
    }
}

impl Default for TemperatureSnapshot {
    fn default() -> Self {
        Self::all_faulted(SensorFault::NoResponse)
    }
}

// ---------------------------------------------------------------------------
// Pump commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Pump {
    /// Solar fluid loop.
    Solar,
    /// Tank → external heat exchanger.
    Exchanger,
    /// Tank → oil-burner boiler tank.
    Boiler,
}

impl Pump {
    pub const ALL: [Pump; 3] = [Self::Solar, Self::Exchanger, Self::Boiler];

    pub fn name(self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Exchanger => "exchanger",
            Self::Boiler => "boiler",
        }
    }
}

impl fmt::Display for Pump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Commanded on/off state of the three pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PumpState {
    pub solar: bool,
    pub exchanger: bool,
    pub boiler: bool,
}

impl PumpState {
    /// All pumps stopped.  The fail-safe output.
    pub const fn all_off() -> Self {
        Self {
            solar: false,
            exchanger: false,
            boiler: false,
        }
    }

    /// Solar and exchanger loops together: load the tank.
    pub const fn transfer() -> Self {
        Self {
            solar: true,
            exchanger: true,
            boiler: false,
        }
    }

    /// Everything on: load the tank and bleed heat into the boiler tank.
    pub const fn unload() -> Self {
        Self {
            solar: true,
            exchanger: true,
            boiler: true,
        }
    }

    pub fn is_on(&self, pump: Pump) -> bool {
        match pump {
            Pump::Solar => self.solar,
            Pump::Exchanger => self.exchanger,
            Pump::Boiler => self.boiler,
        }
    }

    pub fn any_on(&self) -> bool {
        self.solar || self.exchanger || self.boiler
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool| if on { "ON" } else { "off" };
        write!(
            f,
            "solar={} exchanger={} boiler={}",
            flag(self.solar),
            flag(self.exchanger),
            flag(self.boiler)
        )
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    /// CycleTimer: time accumulated in the current phase.
    pub phase_elapsed: Duration,
    /// Total steps since start.
    pub total_steps: u64,
    /// Latest snapshot.  Replaced before each update.
    pub snapshot: TemperatureSnapshot,
    /// Commanded pump outputs after the step.
    pub commands: PumpState,
    pub config: ControlConfig,
}

impl FsmContext {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            phase_elapsed: Duration::ZERO,
            total_steps: 0,
            snapshot: TemperatureSnapshot::default(),
            commands: PumpState::all_off(),
            config,
        }
    }

    /// Collector is hot enough over the tank to start loading.
    pub fn can_start_transfer(&self) -> bool {
        self.snapshot
            .delta_c()
            .is_some_and(|d| d >= self.config.start_delta_c)
    }

    /// Collector still delivers useful heat (delta at or above the stop threshold).
    pub fn has_useful_heat(&self) -> bool {
        self.snapshot
            .delta_c()
            .is_some_and(|d| d >= self.config.stop_delta_c)
    }

    pub fn tank_saturated(&self) -> bool {
        self.snapshot
            .tank_bottom_c()
            .is_some_and(|t| t >= self.config.saturation_temp_c)
    }
}
