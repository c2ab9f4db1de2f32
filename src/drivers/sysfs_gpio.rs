//! Linux sysfs GPIO output lines.
//!
//! ```text
//! /sys/class/gpio/export            ← write "17"
//! /sys/class/gpio/gpio17/direction  ← write "low" | "high"
//! /sys/class/gpio/gpio17/value      ← write "0" | "1"
//! ```
//!
//! Setting the direction to `low`/`high` configures the line as an output
//! and drives the initial level in one step, so a relay never glitches on
//! while the line is being claimed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use log::{debug, info};

/// Root of the kernel's GPIO class directory.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev may need a moment to fix permissions on a freshly exported line.
const EXPORT_SETTLE_ATTEMPTS: u32 = 10;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// I/O failure on a sysfs GPIO file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysfsGpioError(pub io::ErrorKind);

impl embedded_hal::digital::Error for SysfsGpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<io::Error> for SysfsGpioError {
    fn from(e: io::Error) -> Self {
        Self(e.kind())
    }
}

/// One exported output line.
#[derive(Debug)]
pub struct SysfsPin {
    line: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `line` under [`SYSFS_GPIO_ROOT`] as an output at the given level.
    pub fn export(line: u32, initial_high: bool) -> io::Result<Self> {
        Self::open_in(Path::new(SYSFS_GPIO_ROOT), line, initial_high)
    }

    /// Export `line` under an arbitrary GPIO class root.
    pub fn open_in(root: &Path, line: u32, initial_high: bool) -> io::Result<Self> {
        let dir = root.join(format!("gpio{line}"));
        if !dir.exists() {
            debug!("GPIO {line}: exporting");
            fs::write(root.join("export"), line.to_string())?;
        }

        let direction = if initial_high { "high" } else { "low" };
        let mut attempt = 1;
        loop {
            match fs::write(dir.join("direction"), direction) {
                Ok(()) => break,
                Err(e) if attempt < EXPORT_SETTLE_ATTEMPTS
                    && matches!(e.kind(), io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound) =>
                {
                    attempt += 1;
                    thread::sleep(EXPORT_SETTLE_DELAY);
                }
                Err(e) => return Err(e),
            }
        }

        info!("GPIO {line}: output, initial level {direction}");
        Ok(Self {
            line,
            value_path: dir.join("value"),
        })
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn write_level(&mut self, high: bool) -> Result<(), SysfsGpioError> {
        fs::write(&self.value_path, if high { "1" } else { "0" })?;
        Ok(())
    }
}

impl ErrorType for SysfsPin {
    type Error = SysfsGpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), SysfsGpioError> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), SysfsGpioError> {
        self.write_level(true)
    }
}
