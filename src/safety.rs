//! Safety supervisor.
//!
//! The supervisor runs **every cycle after the sensor poll** and keeps a
//! latched fault bitmask.  The state machine does not read it: the only
//! fault that changes pump behaviour (a sensor-critical snapshot) is
//! handled inside `step` directly.  The mask exists so that every fault
//! is reported exactly once when it appears and once when it clears,
//! instead of being logged on every cycle it persists.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (e.g. tank-top probe stops answering).
//! 2. The supervisor sets the corresponding bit and logs `SAFETY FAULT SET`.
//! 3. Each cycle it re-evaluates.  When the condition clears, it unsets the
//!    bit and logs `SAFETY FAULT CLEARED`.
//!
//! Several faults may be active at once.

use crate::error::SafetyFault;
use crate::fsm::context::TemperatureSnapshot;
use crate::sensors::SensorId;
use log::{error, info};

/// Safety supervisor.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the sensor conditions against the latest snapshot.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, snap: &TemperatureSnapshot) -> u8 {
        // ── Per-sensor faults ─────────────────────────────────────
        for id in SensorId::ALL {
            self.eval_fault(SafetyFault::for_sensor(id), snap.reading(id).is_err());
        }

        // ── Decision possible at all? ─────────────────────────────
        self.eval_fault(SafetyFault::CriticalSensorLoss, snap.critical.is_some());

        self.faults
    }

    /// Record whether the last pump command failed to apply.
    pub fn set_actuator_unconfirmed(&mut self, unconfirmed: bool) {
        self.eval_fault(SafetyFault::ActuatorUnconfirmed, unconfirmed);
    }

    /// Record whether the data log is currently dropping records.
    pub fn set_logging_degraded(&mut self, degraded: bool) {
        self.eval_fault(SafetyFault::LoggingDegraded, degraded);
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
