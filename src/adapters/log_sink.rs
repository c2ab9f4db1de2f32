//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events as
//! single `log` records with a fixed prefix, so they can be grepped out of
//! the journal.

use core::fmt;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::fsm::context::Reading;
use crate::sensors::SensorId;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// `23.1` or `ERR`.
struct Celsius(Option<f32>);

impl From<Reading> for Celsius {
    fn from(r: Reading) -> Self {
        Self(r.ok())
    }
}

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(c) => write!(f, "{c:.1}"),
            None => f.write_str("ERR"),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Cycle(c) => {
                let s = &c.snapshot;
                info!(
                    "CYCLE | #{} {} | pipe={}/{} air={} tank={}/{}\u{00b0}C delta={} | {} | applied={} | faults=0b{:08b}",
                    c.cycle,
                    c.mode,
                    Celsius::from(s.reading(SensorId::CollectorPipe1)),
                    Celsius::from(s.reading(SensorId::CollectorPipe2)),
                    Celsius::from(s.reading(SensorId::CollectorAir)),
                    Celsius::from(s.reading(SensorId::TankBottom)),
                    Celsius::from(s.reading(SensorId::TankTop)),
                    Celsius(s.delta_c()),
                    c.pumps,
                    if c.applied { "yes" } else { "NO" },
                    c.fault_flags,
                );
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE | {from} -> {to}");
            }
            AppEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::FailSafe(reason) => {
                warn!("FAILSAFE | {reason}, all pumps off");
            }
            AppEvent::ActuatorFault(e) => {
                warn!("ACTUATOR | {e}");
            }
            AppEvent::LoggingFault(e) => {
                warn!("DATALOG | record dropped: {e}");
            }
            AppEvent::LoggingRecovered => {
                info!("DATALOG | recovered");
            }
            AppEvent::Started(mode) => {
                info!("START | initial_mode={mode}");
            }
            AppEvent::ShutdownComplete {
                cycles,
                pumps_confirmed_off,
            } => {
                if *pumps_confirmed_off {
                    info!("STOP | after {cycles} cycles, pumps off");
                } else {
                    warn!("STOP | after {cycles} cycles, pumps NOT confirmed off");
                }
            }
        }
    }
}
