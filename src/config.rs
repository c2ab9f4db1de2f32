//! System configuration parameters
//!
//! All tunable parameters for the solar-thermal controller.  Loaded once at
//! startup from a JSON file; any field missing from the file falls back to
//! the installation's historical values below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sensors::SensorId;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SOLARTHERMAL_CONFIG";
/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/solarthermal/config.json";

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub sensors: SensorConfig,
    pub pumps: PumpConfig,
    pub control: ControlConfig,
    pub timing: TimingConfig,
    pub datalog: DataLogConfig,
}

/// One-wire device files and the plausibility window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub collector_pipe_1: PathBuf,
    pub collector_pipe_2: PathBuf,
    pub collector_air: PathBuf,
    pub tank_bottom: PathBuf,
    pub tank_top: PathBuf,
    /// Readings below this (°C) are treated as a sensor fault.
    pub plausible_min_c: f32,
    /// Readings above this (°C) are treated as a sensor fault.
    pub plausible_max_c: f32,
}

impl SensorConfig {
    /// Device file for a sensor.
    pub fn path(&self, sensor: SensorId) -> &Path {
        match sensor {
            SensorId::CollectorPipe1 => &self.collector_pipe_1,
            SensorId::CollectorPipe2 => &self.collector_pipe_2,
            SensorId::CollectorAir => &self.collector_air,
            SensorId::TankBottom => &self.tank_bottom,
            SensorId::TankTop => &self.tank_top,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            collector_pipe_1: "/sys/bus/w1/devices/28-00000b55130f/w1_slave".into(),
            collector_pipe_2: "/sys/bus/w1/devices/28-00000b56108d/w1_slave".into(),
            collector_air: "/sys/bus/w1/devices/28-00000b55c049/w1_slave".into(),
            tank_bottom: "/sys/bus/w1/devices/28-00000b543dc1/w1_slave".into(),
            tank_top: "/sys/bus/w1/devices/28-00000b55beea/w1_slave".into(),
            plausible_min_c: -20.0,
            plausible_max_c: 150.0,
        }
    }
}

/// GPIO lines of the pump relays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Solar fluid loop (collector → external heat exchanger).
    pub solar_gpio: u32,
    /// Tank water loop to the external heat exchanger.
    pub exchanger_gpio: u32,
    /// Tank water loop to the oil-burner boiler tank.
    pub boiler_gpio: u32,
    /// Relay board energises on a low level.
    pub active_low: bool,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            solar_gpio: 17,
            exchanger_gpio: 27,
            boiler_gpio: 22,
            active_low: false,
        }
    }
}

/// Hysteresis thresholds and saturated duty-cycle timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Pipe-over-tank delta (°C) at which heat transfer starts.
    pub start_delta_c: f32,
    /// Pipe-over-tank delta (°C) below which heat transfer stops.
    pub stop_delta_c: f32,
    /// Tank-bottom temperature (°C) at which the tank counts as fully loaded.
    pub saturation_temp_c: f32,
    /// Boiler unload burst length (seconds).
    pub active_duration_secs: u32,
    /// Pause between unload bursts (seconds).
    pub rest_duration_secs: u32,
}

impl ControlConfig {
    pub fn active_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.active_duration_secs))
    }

    pub fn rest_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.rest_duration_secs))
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            start_delta_c: 8.0,
            stop_delta_c: 5.0,
            saturation_temp_c: 60.0,
            active_duration_secs: 30,
            rest_duration_secs: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Control cycle period (milliseconds)
    pub cycle_period_ms: u32,
    /// Upper bound for a single sensor read (milliseconds)
    pub sensor_timeout_ms: u32,
}

impl TimingConfig {
    pub fn cycle_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.cycle_period_ms))
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.sensor_timeout_ms))
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: 10_000,
            sensor_timeout_ms: 2_000,
        }
    }
}

/// CSV data recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLogConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Inserted between the timestamp and the file counter.
    pub file_base: String,
    /// A new file with a fresh header is started every this many cycles.
    pub rotate_every_cycles: u32,
}

impl Default for DataLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "/home/pi/RPi_Projects/SolarThermalControl/Data".into(),
            file_base: "_SolarThermal_Data_".into(),
            rotate_every_cycles: 2000,
        }
    }
}

impl SystemConfig {
    /// Reject values that would make the controller unsafe or meaningless.
    /// Nothing is clamped: a bad value stops startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.control;
        if !(c.start_delta_c.is_finite() && c.stop_delta_c.is_finite()) {
            return Err(ConfigError::ValidationFailed("hysteresis deltas must be finite"));
        }
        if c.stop_delta_c < 0.0 {
            return Err(ConfigError::ValidationFailed("stop delta must not be negative"));
        }
        if c.start_delta_c <= c.stop_delta_c {
            return Err(ConfigError::ValidationFailed(
                "start delta must be above stop delta",
            ));
        }
        if !c.saturation_temp_c.is_finite() {
            return Err(ConfigError::ValidationFailed("saturation temperature must be finite"));
        }
        if c.active_duration_secs == 0 || c.rest_duration_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "active and rest durations must be non-zero",
            ));
        }

        let s = &self.sensors;
        if SensorId::ALL
            .iter()
            .any(|id| s.path(*id).as_os_str().is_empty())
        {
            return Err(ConfigError::ValidationFailed("every sensor needs a device path"));
        }
        if !(s.plausible_min_c < s.plausible_max_c) {
            return Err(ConfigError::ValidationFailed("plausible range is empty"));
        }
        if c.saturation_temp_c >= s.plausible_max_c {
            return Err(ConfigError::ValidationFailed(
                "saturation temperature outside plausible range",
            ));
        }

        let p = &self.pumps;
        if p.solar_gpio == p.exchanger_gpio
            || p.solar_gpio == p.boiler_gpio
            || p.exchanger_gpio == p.boiler_gpio
        {
            return Err(ConfigError::ValidationFailed("pump GPIO lines must be distinct"));
        }

        if self.timing.cycle_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("cycle period is zero"));
        }
        if self.timing.sensor_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("sensor timeout is zero"));
        }

        if self.datalog.enabled {
            if self.datalog.directory.as_os_str().is_empty() {
                return Err(ConfigError::ValidationFailed("data log directory is empty"));
            }
            if self.datalog.rotate_every_cycles == 0 {
                return Err(ConfigError::ValidationFailed(
                    "data log rotation interval is zero",
                ));
            }
        }

        Ok(())
    }
}

/// Read, parse and validate the config file at `path`.
pub fn load_from_path(path: &Path) -> Result<SystemConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound,
        kind => ConfigError::IoError(kind),
    })?;
    let config: SystemConfig = serde_json::from_str(&text).map_err(|e| {
        log::error!("Config {} rejected: {}", path.display(), e);
        ConfigError::Corrupted
    })?;
    config.validate()?;
    Ok(config)
}
