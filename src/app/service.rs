//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the sensor aggregator, the control state machine, the
//! safety supervisor and the diagnostics.  It exposes one operation per
//! control cycle.  All I/O flows through port traits injected at call sites,
//! making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorReader ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                   │        AppService         │
//! PumpActuator ◀────│  Aggregator · FSM · Safety│ ──▶ DataLogger
//!                   └──────────────────────────┘
//! ```
//!
//! Nothing that happens at a port boundary ends the loop.  A failed pump
//! write is reported, followed by a best-effort all-off, and retried next
//! cycle; a failed log append drops that record only.

use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::diagnostics::{FaultKind, FaultLog, RuntimeMetrics};
use crate::error::SafetyFault;
use crate::fsm::context::{PumpState, TemperatureSnapshot};
use crate::fsm::{ControlMode, ControlStateMachine, StepOutcome};
use crate::safety::SafetySupervisor;
use crate::sensors::{SensorAggregator, SensorId};

use super::events::{AppEvent, CycleSummary};
use super::ports::{DataLogger, EventSink, PumpActuator, SensorReader};

/// How often shutdown tries to confirm the pumps are off.
pub const SHUTDOWN_OFF_ATTEMPTS: u32 = 3;

/// What one call to [`AppService::run_cycle`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcome: StepOutcome,
    /// The actuator confirmed `outcome.pumps`.
    pub applied: bool,
    /// The record reached the data log.
    pub logged: bool,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    aggregator: SensorAggregator,
    fsm: ControlStateMachine,
    safety: SafetySupervisor,
    fault_log: FaultLog,
    metrics: RuntimeMetrics,
    /// Last output state the actuator confirmed.  `None` until the first
    /// successful apply and after any failure: pumps are then assumed stopped.
    applied: Option<PumpState>,
    cycle: u64,
    logging_degraded: bool,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            aggregator: SensorAggregator::new(&config.sensors),
            fsm: ControlStateMachine::new(config.control.clone()),
            safety: SafetySupervisor::new(),
            fault_log: FaultLog::new(),
            metrics: RuntimeMetrics::default(),
            applied: None,
            cycle: 0,
            logging_degraded: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in its initial mode (Idle).
    pub fn start(&mut self, sink: &mut impl EventSink) {
        let mode = self.fsm.start();
        sink.emit(&AppEvent::Started(mode));
        info!("AppService started in {mode}");
    }

    /// Stop every pump and force the FSM to Idle.
    ///
    /// Retries `all_off` up to [`SHUTDOWN_OFF_ATTEMPTS`] times.  Returns
    /// whether the actuator confirmed the pumps are off.
    pub fn shutdown(&mut self, hw: &mut impl PumpActuator, sink: &mut impl EventSink) -> bool {
        let prev_mode = self.fsm.mode();
        self.fsm.force_transition(ControlMode::Idle);
        if prev_mode != ControlMode::Idle {
            self.metrics.mode_transitions += 1;
            sink.emit(&AppEvent::ModeChanged {
                from: prev_mode,
                to: ControlMode::Idle,
            });
        }

        let mut confirmed = false;
        for attempt in 1..=SHUTDOWN_OFF_ATTEMPTS {
            match hw.all_off() {
                Ok(()) => {
                    confirmed = true;
                    break;
                }
                Err(e) => {
                    warn!("Shutdown: all-off attempt {attempt}/{SHUTDOWN_OFF_ATTEMPTS} failed: {e}");
                    self.metrics.actuator_faults += 1;
                    self.fault_log.record(self.cycle, FaultKind::Actuator, e);
                    sink.emit(&AppEvent::ActuatorFault(e));
                }
            }
        }

        self.applied = confirmed.then(PumpState::all_off);
        self.safety.set_actuator_unconfirmed(!confirmed);
        sink.emit(&AppEvent::ShutdownComplete {
            cycles: self.cycle,
            pumps_confirmed_off: confirmed,
        });
        info!(
            "AppService stopped after {} cycles, pumps confirmed off: {confirmed}",
            self.cycle
        );
        confirmed
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full control cycle:
    /// poll sensors → safety → FSM step → apply pumps → data log.
    ///
    /// The `hw` parameter satisfies **both** [`SensorReader`] and
    /// [`PumpActuator`]; this avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn run_cycle(
        &mut self,
        dt: Duration,
        timestamp: DateTime<Local>,
        hw: &mut (impl SensorReader + PumpActuator),
        datalog: &mut impl DataLogger,
        sink: &mut impl EventSink,
    ) -> CycleReport {
        self.cycle += 1;
        self.metrics.cycles = self.cycle;
        let prev_faults = self.safety.faults();
        let prev_mode = self.fsm.mode();

        // 1. Poll sensors
        let snapshot = self.aggregator.poll(hw);
        self.note_sensor_faults(&snapshot, prev_faults);

        // 2. Control decision (pure state logic)
        let outcome = self.fsm.step(snapshot, dt);
        if let Some(fault) = outcome.fault {
            self.metrics.critical_faults += 1;
            sink.emit(&AppEvent::FailSafe(fault));
        }
        if outcome.mode != prev_mode {
            self.metrics.mode_transitions += 1;
            sink.emit(&AppEvent::ModeChanged {
                from: prev_mode,
                to: outcome.mode,
            });
        }

        // 3. Apply pump commands via PumpActuator
        let applied = self.apply_pumps(outcome.pumps, hw, sink);

        // 4. Hand the record to the data log
        let logged = self.append_record(timestamp, &snapshot, &outcome, datalog, sink);

        // 5. Report fault-set changes once
        let faults = self.safety.faults();
        if faults & !prev_faults != 0 {
            sink.emit(&AppEvent::FaultDetected(faults));
        } else if prev_faults != 0 && faults == 0 {
            sink.emit(&AppEvent::FaultCleared);
        }

        sink.emit(&AppEvent::Cycle(CycleSummary {
            cycle: self.cycle,
            mode: outcome.mode,
            snapshot,
            pumps: outcome.pumps,
            applied,
            fault_flags: faults,
        }));

        CycleReport {
            cycle: self.cycle,
            outcome,
            applied,
            logged,
        }
    }

    /// Note a scheduler tick that started later than its deadline.
    pub fn record_overrun(&mut self, late_by: Duration) {
        self.metrics.overruns += 1;
        self.fault_log.record(
            self.cycle,
            FaultKind::Overrun,
            format_args!("late by {} ms", late_by.as_millis()),
        );
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> ControlMode {
        self.fsm.mode()
    }

    /// Control cycles executed since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    /// Last pump state confirmed by the actuator.
    pub fn applied_pumps(&self) -> Option<PumpState> {
        self.applied
    }

    pub fn last_snapshot(&self) -> &TemperatureSnapshot {
        self.fsm.last_snapshot()
    }

    pub fn is_logging_degraded(&self) -> bool {
        self.logging_degraded
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    pub fn fault_log(&self) -> &FaultLog {
        &self.fault_log
    }

    // ── Internal ──────────────────────────────────────────────

    /// Count every faulted sensor; keep a history entry only when a fault
    /// first appears.
    fn note_sensor_faults(&mut self, snapshot: &TemperatureSnapshot, prev_faults: u8) {
        let faults = self.safety.evaluate(snapshot);
        let raised = faults & !prev_faults;

        for (id, fault) in snapshot.faults() {
            self.metrics.sensor_faults[id as usize] += 1;
            if raised & SafetyFault::for_sensor(id).mask() != 0 {
                self.fault_log.record(self.cycle, FaultKind::Sensor(id), fault);
            }
        }
        if let Some(critical) = snapshot.critical {
            if raised & SafetyFault::CriticalSensorLoss.mask() != 0 {
                self.fault_log
                    .record(self.cycle, FaultKind::SensorCritical, critical);
            }
        }
        if snapshot.degraded {
            debug!(
                "Cycle {}: degraded snapshot, control pipe {:?} °C from {}",
                self.cycle,
                snapshot.pipe_c,
                pipe_source(snapshot)
            );
        }
    }

    fn apply_pumps(
        &mut self,
        pumps: PumpState,
        hw: &mut impl PumpActuator,
        sink: &mut impl EventSink,
    ) -> bool {
        match hw.apply(pumps) {
            Ok(report) => {
                debug!("Pumps applied: {pumps} (changed: {})", report.changed);
                self.applied = Some(pumps);
                self.safety.set_actuator_unconfirmed(false);
                true
            }
            Err(e) => {
                warn!("Pump command {pumps} not applied: {e}; retrying next cycle");
                self.applied = None;
                self.metrics.actuator_faults += 1;
                if !self.safety.has_fault(SafetyFault::ActuatorUnconfirmed) {
                    self.fault_log.record(self.cycle, FaultKind::Actuator, e);
                }
                self.safety.set_actuator_unconfirmed(true);
                sink.emit(&AppEvent::ActuatorFault(e));
                // Best effort: stop whatever lines can still be written.
                if let Err(off_err) = hw.all_off() {
                    warn!("Fallback all-off after failed apply also failed: {off_err}");
                }
                false
            }
        }
    }

    fn append_record(
        &mut self,
        timestamp: DateTime<Local>,
        snapshot: &TemperatureSnapshot,
        outcome: &StepOutcome,
        datalog: &mut impl DataLogger,
        sink: &mut impl EventSink,
    ) -> bool {
        match datalog.append(timestamp, self.cycle, snapshot, outcome.pumps, outcome.mode) {
            Ok(()) => {
                if self.logging_degraded {
                    info!("Data log recovered at cycle {}", self.cycle);
                    sink.emit(&AppEvent::LoggingRecovered);
                }
                self.logging_degraded = false;
                self.safety.set_logging_degraded(false);
                true
            }
            Err(e) => {
                self.metrics.logging_faults += 1;
                if !self.logging_degraded {
                    warn!("Data log degraded: {e}; control continues without logging");
                    self.fault_log.record(self.cycle, FaultKind::Logging, e);
                }
                self.logging_degraded = true;
                self.safety.set_logging_degraded(true);
                sink.emit(&AppEvent::LoggingFault(e));
                false
            }
        }
    }
}

fn pipe_source(snapshot: &TemperatureSnapshot) -> &'static str {
    match (
        snapshot.reading(SensorId::CollectorPipe1).is_ok(),
        snapshot.reading(SensorId::CollectorPipe2).is_ok(),
    ) {
        (true, true) => "both pipe probes",
        (true, false) => SensorId::CollectorPipe1.name(),
        (false, true) => SensorId::CollectorPipe2.name(),
        (false, false) => "no pipe probe",
    }
}
