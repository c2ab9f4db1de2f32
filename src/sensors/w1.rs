//! DS18B20 one-wire temperature probes via the Linux `w1_therm` driver.
//!
//! Each probe appears as `/sys/bus/w1/devices/28-XXXXXXXXXXXX/w1_slave`.
//! Reading the file triggers a conversion and yields a two-line record:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line carries the driver's CRC verdict, the second the
//! temperature in millidegrees Celsius.  [`parse_record`] turns a record into
//! a temperature or a [`SensorFault`]; it never fabricates a value.
//!
//! ## Timeouts
//!
//! A conversion on a sick bus can block the reading thread for seconds.
//! [`W1SensorReader`] performs the file read on a helper thread and waits at
//! most the configured timeout.  While a stuck read is still in flight, further
//! reads of that probe fail fast with [`SensorFault::Timeout`] instead of
//! piling up threads.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::app::ports::SensorReader;
use crate::config::SensorConfig;
use crate::error::SensorFault;

use super::SensorId;

/// Raw value a DS18B20 reports before its first conversion.
pub const POWER_ON_RESET_MILLI_C: i32 = 85_000;
/// Raw value the driver reports when the conversion failed.
pub const CONVERSION_FAILED_MILLI_C: i32 = -1;

/// Parse a `w1_slave` record into °C.
pub fn parse_record(text: &str) -> Result<f32, SensorFault> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let (Some(crc_line), Some(data_line)) = (lines.next(), lines.next()) else {
        return Err(SensorFault::Truncated);
    };

    let Some(crc_pos) = crc_line.find("crc=") else {
        return Err(SensorFault::Malformed);
    };
    let verdict = crc_line[crc_pos..].split_whitespace().nth(1);
    match verdict {
        Some("YES") => {}
        Some("NO") => return Err(SensorFault::CrcMismatch),
        _ => return Err(SensorFault::Malformed),
    }

    let Some(t_pos) = data_line.rfind("t=") else {
        return Err(SensorFault::Malformed);
    };
    let raw: i32 = data_line[t_pos + 2..]
        .trim()
        .parse()
        .map_err(|_| SensorFault::Malformed)?;

    match raw {
        POWER_ON_RESET_MILLI_C => Err(SensorFault::PowerOnReset),
        CONVERSION_FAILED_MILLI_C => Err(SensorFault::ConversionFailed),
        _ => Ok(raw as f32 / 1000.0),
    }
}

struct Probe {
    path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

/// [`SensorReader`] over the sysfs one-wire device files.
pub struct W1SensorReader {
    probes: [Probe; SensorId::COUNT],
    timeout: Duration,
}

impl W1SensorReader {
    pub fn new(config: &SensorConfig, timeout: Duration) -> Self {
        Self {
            probes: SensorId::ALL.map(|id| Probe {
                path: config.path(id).to_path_buf(),
                in_flight: Arc::new(AtomicBool::new(false)),
            }),
            timeout,
        }
    }

    fn read_with_timeout(&self, sensor: SensorId) -> Result<String, SensorFault> {
        let probe = &self.probes[sensor as usize];
        if probe.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Sensor {sensor}: previous read still blocked");
            return Err(SensorFault::Timeout);
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let path = probe.path.clone();
        let in_flight = Arc::clone(&probe.in_flight);
        let spawned = thread::Builder::new()
            .name(format!("w1-{sensor}"))
            .spawn(move || {
                let result = fs::read(&path);
                in_flight.store(false, Ordering::Release);
                let _ = tx.send(result);
            });
        if spawned.is_err() {
            probe.in_flight.store(false, Ordering::Release);
            return Err(SensorFault::NoResponse);
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(bytes)) => String::from_utf8(bytes).map_err(|_| SensorFault::Malformed),
            Ok(Err(e)) => Err(map_io_error(&e)),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(SensorFault::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SensorFault::NoResponse),
        }
    }
}

fn map_io_error(e: &io::Error) -> SensorFault {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => SensorFault::Truncated,
        io::ErrorKind::InvalidData => SensorFault::Malformed,
        _ => SensorFault::NoResponse,
    }
}

impl SensorReader for W1SensorReader {
    fn read(&mut self, sensor: SensorId) -> Result<f32, SensorFault> {
        let text = self.read_with_timeout(sensor)?;
        parse_record(&text)
    }
}
