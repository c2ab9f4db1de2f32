//! Pump relay driver.
//!
//! Three relay-switched circulation pumps (solar loop, heat exchanger,
//! boiler transfer), each behind one digital output line.
//!
//! ## Safety contract
//!
//! This driver is a dumb actuator: it does whatever [`PumpState`] it is
//! given.  Interlocks (boiler only while saturated, solar and exchanger
//! together) are enforced by the state machine.
//!
//! ## Confirmation
//!
//! The driver remembers the last state that was written completely.  Every
//! line is written even when an earlier one fails, and the first error is
//! returned.  A partial write leaves the cache empty, so the next `apply`
//! rewrites every line instead of trusting what it thinks is set.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::ports::{ApplyReport, PumpActuator};
use crate::error::ActuatorError;
use crate::fsm::context::{Pump, PumpState};

/// One relay line.
pub struct PumpLine<P> {
    pin: P,
    /// Relay energises on a low level.
    active_low: bool,
}

impl<P: OutputPin> PumpLine<P> {
    pub fn new(pin: P, active_low: bool) -> Self {
        Self { pin, active_low }
    }

    fn drive(&mut self, on: bool) -> Result<(), P::Error> {
        if on != self.active_low {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}

/// [`PumpActuator`] over three `embedded-hal` output pins.
pub struct GpioPumpActuator<P> {
    /// Indexed in [`Pump::ALL`] order.
    lines: [PumpLine<P>; 3],
    confirmed: Option<PumpState>,
}

impl<P: OutputPin> GpioPumpActuator<P> {
    pub fn new(solar: PumpLine<P>, exchanger: PumpLine<P>, boiler: PumpLine<P>) -> Self {
        Self {
            lines: [solar, exchanger, boiler],
            confirmed: None,
        }
    }

    /// Last state written completely, if any.
    pub fn confirmed(&self) -> Option<PumpState> {
        self.confirmed
    }

    fn write(&mut self, pump: Pump, on: bool) -> Result<(), ActuatorError> {
        let line = &mut self.lines[pump as usize];
        line.drive(on).map_err(|e| {
            error!("Pump {pump}: GPIO write failed: {e:?}");
            ActuatorError::GpioWriteFailed(pump)
        })
    }
}

impl<P: OutputPin> PumpActuator for GpioPumpActuator<P> {
    fn apply(&mut self, pumps: PumpState) -> Result<ApplyReport, ActuatorError> {
        let previous = self.confirmed.take();
        let mut changed = false;
        let mut first_err = None;

        // A failing line must not keep the others from switching.
        for pump in Pump::ALL {
            let on = pumps.is_on(pump);
            if previous.is_some_and(|p| p.is_on(pump) == on) {
                continue;
            }
            match self.write(pump, on) {
                Ok(()) => {
                    debug!("Pump {pump} -> {}", if on { "on" } else { "off" });
                    changed = true;
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                self.confirmed = Some(pumps);
                Ok(ApplyReport { changed })
            }
        }
    }

    fn all_off(&mut self) -> Result<(), ActuatorError> {
        self.confirmed = None;
        let mut first_err = None;
        for pump in Pump::ALL {
            if let Err(e) = self.write(pump, false) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                self.confirmed = Some(PumpState::all_off());
                Ok(())
            }
        }
    }
}
