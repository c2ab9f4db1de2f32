//! Fault history and runtime diagnostics.
//!
//! [`FaultLog`] keeps the most recent faults in a fixed-capacity ring so that
//! a long-running controller never grows its memory with a flaky sensor.
//! [`RuntimeMetrics`] counts what happened since startup; the binary dumps it
//! as JSON on shutdown.

use core::fmt;

use heapless::Deque;
use serde::Serialize;

use crate::sensors::SensorId;

/// Number of fault records retained.
pub const FAULT_LOG_SLOTS: usize = 16;
/// Maximum bytes kept of a fault description.
pub const FAULT_DETAIL_LEN: usize = 48;

/// Fault classes recorded in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    Sensor(SensorId),
    SensorCritical,
    Actuator,
    Logging,
    Overrun,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(id) => write!(f, "sensor {id}"),
            Self::SensorCritical => write!(f, "sensor critical"),
            Self::Actuator => write!(f, "actuator"),
            Self::Logging => write!(f, "logging"),
            Self::Overrun => write!(f, "overrun"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub cycle: u64,
    pub kind: FaultKind,
    pub detail: heapless::String<FAULT_DETAIL_LEN>,
}

impl FaultRecord {
    pub fn new(cycle: u64, kind: FaultKind, detail: &str) -> Self {
        Self {
            cycle,
            kind,
            detail: truncate(detail),
        }
    }
}

/// Copy `s` into a bounded string, cutting at a char boundary.
fn truncate(s: &str) -> heapless::String<FAULT_DETAIL_LEN> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Ring of the most recent faults.  The oldest record is dropped when full.
#[derive(Debug, Default)]
pub struct FaultLog {
    records: Deque<FaultRecord, FAULT_LOG_SLOTS>,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FaultRecord) {
        if self.records.is_full() {
            self.records.pop_front();
        }
        // Cannot fail: a slot was just freed.
        let _ = self.records.push_back(record);
    }

    pub fn record(&mut self, cycle: u64, kind: FaultKind, detail: impl fmt::Display) {
        self.push(FaultRecord::new(cycle, kind, &detail.to_string()));
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FaultRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&FaultRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Counters since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    pub cycles: u64,
    pub mode_transitions: u64,
    /// Indexed by `SensorId as usize`.
    pub sensor_faults: [u64; SensorId::COUNT],
    pub critical_faults: u64,
    pub actuator_faults: u64,
    pub logging_faults: u64,
    pub overruns: u64,
}

impl RuntimeMetrics {
    pub fn sensor_faults_for(&self, sensor: SensorId) -> u64 {
        self.sensor_faults[sensor as usize]
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
