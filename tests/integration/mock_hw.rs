//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO lines.  Time is simulated: sensor
//! reads advance a shared fake clock by the configured work time, and
//! scheduler sleeps advance it by the requested duration.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone};

use solarthermal::app::events::AppEvent;
use solarthermal::app::ports::{
    ApplyReport, Clock, DataLogger, EventSink, PumpActuator, SensorReader,
};
use solarthermal::error::{ActuatorError, LoggingError, SensorFault};
use solarthermal::fsm::ControlMode;
use solarthermal::fsm::context::{Pump, PumpState, TemperatureSnapshot};
use solarthermal::scheduler::ShutdownSignal;
use solarthermal::sensors::SensorId;

pub type Readings = [Result<f32, SensorFault>; SensorId::COUNT];

/// Pipes 70/71 °C over a 50 °C tank bottom: heat transfer wanted.
pub const SUNNY: Readings = [Ok(70.0), Ok(71.0), Ok(35.0), Ok(50.0), Ok(58.0)];
/// Pipes barely above the tank: no transfer.
pub const OVERCAST: Readings = [Ok(52.0), Ok(52.5), Ok(20.0), Ok(50.0), Ok(55.0)];
/// Hot collector over a tank bottom at saturation.
pub const SATURATED: Readings = [Ok(80.0), Ok(81.0), Ok(40.0), Ok(62.0), Ok(70.0)];

// ── Simulated time ────────────────────────────────────────────

/// Monotonic time shared between the fake clock and the mock hardware.
#[derive(Debug, Clone)]
pub struct SimTime {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

#[allow(dead_code)]
impl SimTime {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    /// Time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

// ── FakeClock ─────────────────────────────────────────────────

/// [`Clock`] over [`SimTime`].  Requests shutdown after a set number of
/// sleeps.
pub struct FakeClock {
    time: SimTime,
    pub sleeps: Vec<Duration>,
    shutdown_after_sleeps: Option<usize>,
}

#[allow(dead_code)]
impl FakeClock {
    pub fn new(time: SimTime) -> Self {
        Self {
            time,
            sleeps: Vec::new(),
            shutdown_after_sleeps: None,
        }
    }

    pub fn shutdown_after_sleeps(mut self, n: usize) -> Self {
        self.shutdown_after_sleeps = Some(n);
        self
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.time.now()
    }

    fn wall_time(&self) -> DateTime<Local> {
        let start = Local
            .with_ymd_and_hms(2024, 7, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Local::now);
        start + chrono::Duration::from_std(self.time.elapsed()).expect("sim time fits")
    }

    fn sleep(&mut self, duration: Duration, shutdown: &ShutdownSignal) {
        self.sleeps.push(duration);
        self.time.advance(duration);
        if self.shutdown_after_sleeps == Some(self.sleeps.len()) {
            shutdown.request();
        }
    }
}

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCall {
    Apply(PumpState),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

/// Sensors and pumps behind one value, like the real `HardwareAdapter`.
pub struct MockHardware {
    time: SimTime,
    pub readings: Readings,
    /// Simulated duration of one cycle's work; consumed front to back,
    /// then `default_work` applies.
    pub work: VecDeque<Duration>,
    pub default_work: Duration,
    /// Simulation time at which each cycle's first read happened.
    pub tick_starts: Vec<Duration>,
    pub calls: Vec<PumpCall>,
    /// Physical output state after the last successful write.
    pub outputs: PumpState,
    /// Every write fails.
    pub fail_writes: bool,
    /// Only `apply` fails; `all_off` still works.
    pub fail_applies: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(time: SimTime) -> Self {
        Self {
            time,
            readings: SUNNY,
            work: VecDeque::new(),
            default_work: Duration::from_secs(1),
            tick_starts: Vec::new(),
            calls: Vec::new(),
            outputs: PumpState::all_off(),
            fail_writes: false,
            fail_applies: false,
        }
    }

    pub fn with_readings(mut self, readings: Readings) -> Self {
        self.readings = readings;
        self
    }

    pub fn last_call(&self) -> Option<&PumpCall> {
        self.calls.last()
    }

    pub fn applies(&self) -> impl Iterator<Item = PumpState> + '_ {
        self.calls.iter().filter_map(|c| match c {
            PumpCall::Apply(p) => Some(*p),
            PumpCall::AllOff => None,
        })
    }
}

impl SensorReader for MockHardware {
    fn read(&mut self, sensor: SensorId) -> Result<f32, SensorFault> {
        if sensor == SensorId::CollectorPipe1 {
            self.tick_starts.push(self.time.elapsed());
            let work = self.work.pop_front().unwrap_or(self.default_work);
            self.time.advance(work);
        }
        self.readings[sensor as usize]
    }
}

impl PumpActuator for MockHardware {
    fn apply(&mut self, pumps: PumpState) -> Result<ApplyReport, ActuatorError> {
        self.calls.push(PumpCall::Apply(pumps));
        if self.fail_writes || self.fail_applies {
            return Err(ActuatorError::GpioWriteFailed(Pump::Solar));
        }
        let changed = self.outputs != pumps;
        self.outputs = pumps;
        Ok(ApplyReport { changed })
    }

    fn all_off(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(PumpCall::AllOff);
        if self.fail_writes {
            return Err(ActuatorError::GpioWriteFailed(Pump::Solar));
        }
        self.outputs = PumpState::all_off();
        Ok(())
    }
}

// ── MemoryDataLog ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggedRecord {
    pub cycle: u64,
    pub mode: ControlMode,
    pub pumps: PumpState,
    pub degraded: bool,
}

#[derive(Default)]
pub struct MemoryDataLog {
    pub records: Vec<LoggedRecord>,
    pub fail: bool,
}

impl DataLogger for MemoryDataLog {
    fn append(
        &mut self,
        _timestamp: DateTime<Local>,
        cycle: u64,
        snapshot: &TemperatureSnapshot,
        pumps: PumpState,
        mode: ControlMode,
    ) -> Result<(), LoggingError> {
        if self.fail {
            return Err(LoggingError::WriteFailed(std::io::ErrorKind::StorageFull));
        }
        self.records.push(LoggedRecord {
            cycle,
            mode,
            pumps,
            degraded: snapshot.degraded,
        });
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn mode_changes(&self) -> Vec<(ControlMode, ControlMode)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ModeChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    /// Mode reported by each `Cycle` event, in order.
    pub fn cycle_modes(&self) -> Vec<ControlMode> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Cycle(c) => Some(c.mode),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
