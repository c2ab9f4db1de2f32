//! AppService integration tests: full cycles against mock adapters.

use std::time::Duration;

use chrono::{Local, TimeZone};

use solarthermal::app::events::AppEvent;
use solarthermal::app::service::{AppService, CycleReport};
use solarthermal::config::SystemConfig;
use solarthermal::diagnostics::FaultKind;
use solarthermal::error::{
    ActuatorError, LoggingError, SafetyFault, SensorCriticalFault, SensorFault,
};
use solarthermal::fsm::ControlMode;
use solarthermal::fsm::context::{Pump, PumpState};
use solarthermal::sensors::SensorId;

use crate::mock_hw::{
    MemoryDataLog, MockHardware, OVERCAST, PumpCall, Readings, RecordingSink, SATURATED, SUNNY,
    SimTime,
};

const DT: Duration = Duration::from_secs(10);

struct Rig {
    hw: MockHardware,
    app: AppService,
    log: MemoryDataLog,
    sink: RecordingSink,
}

fn rig(readings: Readings) -> Rig {
    let mut sink = RecordingSink::default();
    let mut app = AppService::new(&SystemConfig::default());
    app.start(&mut sink);
    Rig {
        hw: MockHardware::new(SimTime::new()).with_readings(readings),
        app,
        log: MemoryDataLog::default(),
        sink,
    }
}

impl Rig {
    fn cycle(&mut self) -> CycleReport {
        let ts = Local
            .with_ymd_and_hms(2024, 7, 1, 12, 0, 0)
            .single()
            .expect("unambiguous");
        self.app
            .run_cycle(DT, ts, &mut self.hw, &mut self.log, &mut self.sink)
    }

    fn cycles(&mut self, n: usize) -> CycleReport {
        let mut last = self.cycle();
        for _ in 1..n {
            last = self.cycle();
        }
        last
    }
}

// ── Heat transfer ─────────────────────────────────────────────

#[test]
fn started_event_reports_idle() {
    let r = rig(OVERCAST);
    assert_eq!(r.sink.events, vec![AppEvent::Started(ControlMode::Idle)]);
}

#[test]
fn hysteresis_starts_and_stops_transfer() {
    let mut r = rig(OVERCAST);
    let report = r.cycle();
    assert_eq!(report.outcome.mode, ControlMode::Idle);
    assert_eq!(r.hw.outputs, PumpState::all_off());

    // Delta 20 °C: start.
    r.hw.readings = SUNNY;
    let report = r.cycle();
    assert_eq!(report.outcome.mode, ControlMode::Transferring);
    assert!(report.applied);
    assert_eq!(r.hw.outputs, PumpState::transfer());

    // Delta 6 °C: inside the band, keep going.
    r.hw.readings = [Ok(56.0), Ok(57.0), Ok(30.0), Ok(50.0), Ok(58.0)];
    assert_eq!(r.cycle().outcome.mode, ControlMode::Transferring);

    // Delta 4 °C: stop.
    r.hw.readings = [Ok(54.0), Ok(54.5), Ok(30.0), Ok(50.0), Ok(58.0)];
    assert_eq!(r.cycle().outcome.mode, ControlMode::Idle);
    assert_eq!(r.hw.outputs, PumpState::all_off());

    // Delta 6 °C again: not enough to restart.
    r.hw.readings = [Ok(56.0), Ok(57.0), Ok(30.0), Ok(50.0), Ok(58.0)];
    assert_eq!(r.cycle().outcome.mode, ControlMode::Idle);

    assert_eq!(
        r.sink.mode_changes(),
        vec![
            (ControlMode::Idle, ControlMode::Transferring),
            (ControlMode::Transferring, ControlMode::Idle),
        ]
    );
    assert_eq!(r.app.metrics().mode_transitions, 2);
}

#[test]
fn every_cycle_is_logged_with_commanded_state() {
    let mut r = rig(SUNNY);
    r.cycles(3);
    assert_eq!(r.log.records.len(), 3);
    let cycles: Vec<u64> = r.log.records.iter().map(|rec| rec.cycle).collect();
    assert_eq!(cycles, vec![1, 2, 3]);
    assert!(r.log.records.iter().all(|rec| rec.pumps == PumpState::transfer()));
    assert_eq!(r.app.cycle_count(), 3);
    assert_eq!(r.app.metrics().cycles, 3);
}

// ── Saturation duty cycle ─────────────────────────────────────

#[test]
fn saturated_tank_alternates_boiler_bursts() {
    let mut r = rig(SATURATED);
    assert_eq!(r.cycle().outcome.mode, ControlMode::Transferring);
    assert_eq!(r.cycle().outcome.mode, ControlMode::SaturatedActive);
    assert_eq!(r.hw.outputs, PumpState::unload());

    // 30 s burst.
    r.cycles(2);
    assert_eq!(r.app.mode(), ControlMode::SaturatedActive);
    assert_eq!(r.cycle().outcome.mode, ControlMode::SaturatedResting);
    assert_eq!(r.hw.outputs, PumpState::all_off());

    // 90 s rest.
    r.cycles(8);
    assert_eq!(r.app.mode(), ControlMode::SaturatedResting);
    assert_eq!(r.cycle().outcome.mode, ControlMode::SaturatedActive);
    assert!(r.hw.outputs.is_on(Pump::Boiler));
}

#[test]
fn cooled_tank_still_gets_another_burst_after_rest() {
    let mut r = rig(SATURATED);
    r.cycles(5);
    assert_eq!(r.app.mode(), ControlMode::SaturatedResting);

    // Boiler burst pulled the tank bottom down to 50 °C; the collector is still hot.
    r.hw.readings = [Ok(80.0), Ok(81.0), Ok(40.0), Ok(50.0), Ok(70.0)];
    r.cycles(8);
    assert_eq!(r.app.mode(), ControlMode::SaturatedResting);
    assert_eq!(r.cycle().outcome.mode, ControlMode::SaturatedActive);
    assert_eq!(r.hw.outputs, PumpState::unload());
}

#[test]
fn lost_heat_ends_burst_early() {
    let mut r = rig(SATURATED);
    r.cycles(2);
    assert_eq!(r.app.mode(), ControlMode::SaturatedActive);

    r.hw.readings = [Ok(64.0), Ok(64.0), Ok(30.0), Ok(62.0), Ok(70.0)];
    assert_eq!(r.cycle().outcome.mode, ControlMode::Idle);
    assert_eq!(r.hw.outputs, PumpState::all_off());
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn one_pipe_probe_lost_keeps_control_running() {
    let mut r = rig(SUNNY);
    r.hw.readings[SensorId::CollectorPipe1 as usize] = Err(SensorFault::CrcMismatch);

    let report = r.cycle();
    assert_eq!(report.outcome.mode, ControlMode::Transferring);
    assert!(report.outcome.fault.is_none());
    assert!(r.app.last_snapshot().degraded);
    assert_eq!(r.app.last_snapshot().pipe_c, Some(71.0));
    assert!(r.log.records[0].degraded);

    let bit = SafetyFault::CollectorPipe1.mask();
    assert_eq!(r.app.fault_flags() & bit, bit);
    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::FaultDetected(_))), 1);

    // Still faulted: counted, but no new history entry or event.
    r.cycles(2);
    assert_eq!(r.app.metrics().sensor_faults_for(SensorId::CollectorPipe1), 3);
    assert_eq!(r.sink.count(|e| matches!(e, AppEvent::FaultDetected(_))), 1);
    let history: Vec<_> = r.app.fault_log().iter().map(|f| f.kind).collect();
    assert_eq!(history, vec![FaultKind::Sensor(SensorId::CollectorPipe1)]);

    r.hw.readings = SUNNY;
    r.cycle();
    assert_eq!(r.app.fault_flags(), 0);
    assert_eq!(r.sink.count(|e| *e == AppEvent::FaultCleared), 1);
}

#[test]
fn auxiliary_probe_faults_do_not_affect_control() {
    let mut r = rig(SUNNY);
    r.hw.readings[SensorId::CollectorAir as usize] = Err(SensorFault::Timeout);
    r.hw.readings[SensorId::TankTop as usize] = Ok(400.0);

    let report = r.cycle();
    assert_eq!(report.outcome.mode, ControlMode::Transferring);
    assert!(r.app.last_snapshot().degraded);
    assert_eq!(
        r.app.last_snapshot().reading(SensorId::TankTop),
        Err(SensorFault::OutOfRange)
    );
}

#[test]
fn both_pipe_probes_lost_forces_pumps_off() {
    let mut r = rig(SUNNY);
    r.cycles(2);
    assert_eq!(r.hw.outputs, PumpState::transfer());

    r.hw.readings[SensorId::CollectorPipe1 as usize] = Err(SensorFault::NoResponse);
    r.hw.readings[SensorId::CollectorPipe2 as usize] = Err(SensorFault::PowerOnReset);
    let report = r.cycle();

    assert_eq!(report.outcome.fault, Some(SensorCriticalFault::CollectorPipesLost));
    assert_eq!(report.outcome.mode, ControlMode::Idle);
    assert_eq!(r.hw.outputs, PumpState::all_off());
    assert!(r.app.fault_flags() & SafetyFault::CriticalSensorLoss.mask() != 0);
    assert!(r.sink.events.contains(&AppEvent::FailSafe(
        SensorCriticalFault::CollectorPipesLost
    )));
    assert_eq!(r.app.metrics().critical_faults, 1);

    // Stays off while the probes are gone.
    r.cycle();
    assert_eq!(r.app.mode(), ControlMode::Idle);
    assert_eq!(r.hw.outputs, PumpState::all_off());

    // Recovers through the normal start rule.
    r.hw.readings = SUNNY;
    assert_eq!(r.cycle().outcome.mode, ControlMode::Transferring);
}

#[test]
fn tank_bottom_lost_forces_pumps_off() {
    let mut r = rig(SATURATED);
    r.cycles(3);
    assert_eq!(r.app.mode(), ControlMode::SaturatedActive);

    r.hw.readings[SensorId::TankBottom as usize] = Err(SensorFault::ConversionFailed);
    let report = r.cycle();
    assert_eq!(report.outcome.fault, Some(SensorCriticalFault::TankBottomLost));
    assert_eq!(r.hw.outputs, PumpState::all_off());
    assert_eq!(r.log.records.last().map(|rec| rec.mode), Some(ControlMode::Idle));
}

// ── Actuator faults ───────────────────────────────────────────

#[test]
fn actuator_failure_is_reported_and_retried() {
    let mut r = rig(SUNNY);
    r.cycle();
    assert_eq!(r.hw.outputs, PumpState::transfer());
    r.hw.fail_applies = true;

    let report = r.cycle();
    assert!(!report.applied);
    assert_eq!(report.outcome.mode, ControlMode::Transferring);
    assert_eq!(r.app.applied_pumps(), None);
    assert!(r.app.fault_flags() & SafetyFault::ActuatorUnconfirmed.mask() != 0);
    // The fallback all-off really stopped the pumps.
    assert_eq!(r.hw.last_call(), Some(&PumpCall::AllOff));
    assert_eq!(r.hw.outputs, PumpState::all_off());

    // The loop keeps running and keeps trying.
    r.cycles(2);
    assert_eq!(
        r.sink.count(|e| *e == AppEvent::ActuatorFault(ActuatorError::GpioWriteFailed(Pump::Solar))),
        3
    );
    assert_eq!(r.app.metrics().actuator_faults, 3);
    assert_eq!(r.app.fault_log().len(), 1);
    assert_eq!(r.hw.outputs, PumpState::all_off());

    r.hw.fail_applies = false;
    let report = r.cycle();
    assert!(report.applied);
    assert_eq!(r.hw.outputs, PumpState::transfer());
    assert_eq!(r.app.applied_pumps(), Some(PumpState::transfer()));
    assert_eq!(r.app.fault_flags(), 0);

    let applies: Vec<_> = r.hw.applies().collect();
    assert_eq!(applies, vec![PumpState::transfer(); 5]);
    let offs = r.hw.calls.iter().filter(|c| **c == PumpCall::AllOff).count();
    assert_eq!(offs, 3);
}

// ── Logging faults ────────────────────────────────────────────

#[test]
fn logging_failure_never_affects_control() {
    let mut r = rig(SUNNY);
    r.log.fail = true;

    let report = r.cycle();
    assert!(!report.logged);
    assert!(report.applied);
    assert_eq!(r.hw.outputs, PumpState::transfer());
    assert!(r.app.is_logging_degraded());
    assert!(r.app.fault_flags() & SafetyFault::LoggingDegraded.mask() != 0);

    r.cycle();
    assert_eq!(
        r.sink.count(|e| matches!(e, AppEvent::LoggingFault(LoggingError::WriteFailed(_)))),
        2
    );
    assert_eq!(r.app.metrics().logging_faults, 2);

    r.log.fail = false;
    assert!(r.cycle().logged);
    assert!(!r.app.is_logging_degraded());
    assert_eq!(r.sink.count(|e| *e == AppEvent::LoggingRecovered), 1);
    assert_eq!(r.log.records.len(), 1);
    assert_eq!(r.log.records[0].cycle, 3);
}

#[test]
fn disabled_data_log_accepts_everything() {
    let mut sink = RecordingSink::default();
    let mut app = AppService::new(&SystemConfig::default());
    app.start(&mut sink);
    let mut hw = MockHardware::new(SimTime::new()).with_readings(SUNNY);
    let mut log: Option<MemoryDataLog> = None;

    let report = app.run_cycle(DT, Local::now(), &mut hw, &mut log, &mut sink);
    assert!(report.logged);
    assert!(!app.is_logging_degraded());
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_from_transfer_reports_mode_change() {
    let mut r = rig(SUNNY);
    r.cycles(2);
    r.sink.clear();

    assert!(r.app.shutdown(&mut r.hw, &mut r.sink));
    assert_eq!(r.hw.last_call(), Some(&PumpCall::AllOff));
    assert_eq!(r.app.applied_pumps(), Some(PumpState::all_off()));
    assert_eq!(
        r.sink.events,
        vec![
            AppEvent::ModeChanged {
                from: ControlMode::Transferring,
                to: ControlMode::Idle
            },
            AppEvent::ShutdownComplete {
                cycles: 2,
                pumps_confirmed_off: true
            },
        ]
    );
}
