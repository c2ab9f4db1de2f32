//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the sensor reader and the pump actuator, exposing them through
//! [`SensorReader`] and [`PumpActuator`] as one value so the service can
//! borrow both at once.  In production `R` is the one-wire reader and `A`
//! the GPIO pump actuator.

use crate::app::ports::{ApplyReport, PumpActuator, SensorReader};
use crate::error::{ActuatorError, SensorFault};
use crate::fsm::context::PumpState;
use crate::sensors::SensorId;

/// Concrete adapter that combines the sensor bus and the pump relays.
pub struct HardwareAdapter<R, A> {
    sensors: R,
    pumps: A,
}

impl<R, A> HardwareAdapter<R, A> {
    pub fn new(sensors: R, pumps: A) -> Self {
        Self { sensors, pumps }
    }

    pub fn pumps(&self) -> &A {
        &self.pumps
    }
}

// ── SensorReader implementation ───────────────────────────────

impl<R: SensorReader, A> SensorReader for HardwareAdapter<R, A> {
    fn read(&mut self, sensor: SensorId) -> Result<f32, SensorFault> {
        self.sensors.read(sensor)
    }
}

// ── PumpActuator implementation ───────────────────────────────

impl<R, A: PumpActuator> PumpActuator for HardwareAdapter<R, A> {
    fn apply(&mut self, pumps: PumpState) -> Result<ApplyReport, ActuatorError> {
        self.pumps.apply(pumps)
    }

    fn all_off(&mut self) -> Result<(), ActuatorError> {
        self.pumps.all_off()
    }
}
