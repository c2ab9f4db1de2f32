//! Sensor subsystem: the one-wire reader and the aggregating [`SensorAggregator`].
//!
//! The aggregator polls every sensor through the [`SensorReader`] port once per
//! cycle and produces the [`TemperatureSnapshot`] that the state machine
//! consumes.  A single flaky sensor must never fail the cycle: every read
//! error or implausible value becomes a per-sensor fault inside the snapshot.

pub mod w1;

use core::fmt;

use log::warn;
use serde::Serialize;

use crate::app::ports::SensorReader;
use crate::config::SensorConfig;
use crate::error::SensorFault;
use crate::fsm::context::TemperatureSnapshot;

/// The five probes of the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum SensorId {
    /// Upper collector pipe, first probe.
    CollectorPipe1 = 0,
    /// Upper collector pipe, redundant second probe.
    CollectorPipe2 = 1,
    /// Air inside the roof collector chamber.
    CollectorAir = 2,
    /// Low side of the hot-water tank.
    TankBottom = 3,
    /// Upper side of the hot-water tank.
    TankTop = 4,
}

impl SensorId {
    pub const COUNT: usize = 5;

    /// Polling order; also the column order of the data log.
    pub const ALL: [SensorId; Self::COUNT] = [
        Self::CollectorPipe1,
        Self::CollectorPipe2,
        Self::CollectorAir,
        Self::TankBottom,
        Self::TankTop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::CollectorPipe1 => "collector-pipe-1",
            Self::CollectorPipe2 => "collector-pipe-2",
            Self::CollectorAir => "collector-air",
            Self::TankBottom => "tank-bottom",
            Self::TankTop => "tank-top",
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Polls all sensors and applies the plausibility window.
pub struct SensorAggregator {
    min_c: f32,
    max_c: f32,
}

impl SensorAggregator {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            min_c: config.plausible_min_c,
            max_c: config.plausible_max_c,
        }
    }

    /// Read every sensor and return a unified snapshot.
    ///
    /// Redundancy substitution and the critical-fault verdict are applied by
    /// [`TemperatureSnapshot::from_readings`].
    pub fn poll(&self, reader: &mut impl SensorReader) -> TemperatureSnapshot {
        let readings = SensorId::ALL.map(|id| {
            let reading = reader.read(id).and_then(|c| self.check_plausible(c));
            if let Err(fault) = reading {
                warn!("Sensor {id}: {fault}");
            }
            reading
        });
        TemperatureSnapshot::from_readings(readings)
    }

    fn check_plausible(&self, celsius: f32) -> Result<f32, SensorFault> {
        if celsius.is_finite() && celsius >= self.min_c && celsius <= self.max_c {
            Ok(celsius)
        } else {
            Err(SensorFault::OutOfRange)
        }
    }
}
