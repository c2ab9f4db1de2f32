//! Rotating CSV data log.
//!
//! One `;`-separated record per control cycle, in the layout the
//! installation's spreadsheets already import:
//!
//! ```text
//! Datarecording with Raspberry in Solar Thermal System
//! /home/pi/.../Data/01072024_120000_SolarThermal_Data_1.csv
//! ---------------------------------------------------
//! PiDate; PiTime; Cycle; PiDateTime; TPPipe1; TPPipe2; TPAir; TTank_d; TTank_u; Mode; PumpS; PumpW; PumpF; Degraded
//! 01.07.2024;12:00:00;1;01.07.2024 12:00:00;72,125;71,000;38,500;55,250;61,000;Transferring;1;1;0;0;
//! ```
//!
//! Temperatures use a decimal comma; a faulted probe is written as `ERR`.
//! A new file (with header block) is started every `rotate_every_cycles`
//! records.  After any I/O error the current file is dropped and the next
//! append starts a fresh one, so logging heals itself once the disk is
//! writable again.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};

use crate::app::ports::DataLogger;
use crate::config::DataLogConfig;
use crate::error::LoggingError;
use crate::fsm::ControlMode;
use crate::fsm::context::{PumpState, Reading, TemperatureSnapshot};
use crate::sensors::SensorId;

const TITLE: &str = "Datarecording with Raspberry in Solar Thermal System";
const SEPARATOR: &str = "---------------------------------------------------";
const HEADLINE: &str = "PiDate; PiTime; Cycle; PiDateTime; TPPipe1; TPPipe2; TPAir; TTank_d; TTank_u; \
                        Mode; PumpS; PumpW; PumpF; Degraded";

struct OpenFile {
    path: PathBuf,
    file: File,
    records: u32,
}

/// [`DataLogger`] writing rotating CSV files.
pub struct CsvDataLog {
    directory: PathBuf,
    file_base: String,
    rotate_every: u32,
    current: Option<OpenFile>,
    files_opened: u32,
}

impl CsvDataLog {
    pub fn new(config: &DataLogConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            file_base: config.file_base.clone(),
            rotate_every: config.rotate_every_cycles.max(1),
            current: None,
            files_opened: 0,
        }
    }

    /// File currently being appended to.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|f| f.path.as_path())
    }

    fn open_next(&mut self, timestamp: DateTime<Local>) -> Result<OpenFile, LoggingError> {
        let create_failed = |e: io::Error| LoggingError::CreateFailed(e.kind());

        fs::create_dir_all(&self.directory).map_err(create_failed)?;
        let number = self.files_opened + 1;
        let name = format!(
            "{}{}{}.csv",
            timestamp.format("%d%m%Y_%H%M%S"),
            self.file_base,
            number
        );
        let path = self.directory.join(name);

        let mut file = File::create(&path).map_err(create_failed)?;
        let header = format!("{TITLE}\n{}\n{SEPARATOR}\n{HEADLINE}\n", path.display());
        file.write_all(header.as_bytes()).map_err(create_failed)?;

        self.files_opened = number;
        info!("Data log: started {}", path.display());
        Ok(OpenFile {
            path,
            file,
            records: 0,
        })
    }
}

impl DataLogger for CsvDataLog {
    fn append(
        &mut self,
        timestamp: DateTime<Local>,
        cycle: u64,
        snapshot: &TemperatureSnapshot,
        pumps: PumpState,
        mode: ControlMode,
    ) -> Result<(), LoggingError> {
        let rotate = self
            .current
            .as_ref()
            .is_none_or(|f| f.records >= self.rotate_every);
        if rotate {
            self.current = None;
            self.current = Some(self.open_next(timestamp)?);
        }

        let line = format_record(timestamp, cycle, snapshot, pumps, mode);
        let Some(current) = self.current.as_mut() else {
            return Err(LoggingError::CreateFailed(io::ErrorKind::NotFound));
        };
        if let Err(e) = current.file.write_all(line.as_bytes()) {
            // Start over with a fresh file next time.
            self.current = None;
            return Err(LoggingError::WriteFailed(e.kind()));
        }
        current.records += 1;
        debug!("Data log: cycle {cycle} -> {}", current.path.display());
        Ok(())
    }
}

/// One CSV line, newline included.
pub fn format_record(
    timestamp: DateTime<Local>,
    cycle: u64,
    snapshot: &TemperatureSnapshot,
    pumps: PumpState,
    mode: ControlMode,
) -> String {
    let bit = |on: bool| if on { '1' } else { '0' };
    let mut line = format!(
        "{};{};{cycle};{};",
        timestamp.format("%d.%m.%Y"),
        timestamp.format("%H:%M:%S"),
        timestamp.format("%d.%m.%Y %H:%M:%S"),
    );
    for id in SensorId::ALL {
        line.push_str(&decimal_comma(snapshot.reading(id)));
        line.push(';');
    }
    line.push_str(&format!(
        "{mode};{};{};{};{};\n",
        bit(pumps.solar),
        bit(pumps.exchanger),
        bit(pumps.boiler),
        bit(snapshot.degraded),
    ));
    line
}

fn decimal_comma(reading: Reading) -> String {
    match reading {
        Ok(c) => format!("{c:.3}").replace('.', ","),
        Err(_) => "ERR".to_owned(),
    }
}
