//! SolarThermal controller: main entry point.
//!
//! Hexagonal architecture driven by a fixed-period cycle scheduler.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter      LogEventSink   CsvDataLog   SystemClock  │
//! │  (W1 sensors + GPIO)  (EventSink)    (DataLogger) (Clock)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Aggregator · FSM · Safety · Diagnostics               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  CycleScheduler (anchored period) · ShutdownSignal (ctrlc)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use solarthermal::adapters::datalog::CsvDataLog;
use solarthermal::adapters::hardware::HardwareAdapter;
use solarthermal::adapters::log_sink::LogEventSink;
use solarthermal::adapters::time::SystemClock;
use solarthermal::app::ports::PumpActuator;
use solarthermal::app::service::AppService;
use solarthermal::config::{self, SystemConfig};
use solarthermal::drivers::pump::{GpioPumpActuator, PumpLine};
use solarthermal::drivers::sysfs_gpio::SysfsPin;
use solarthermal::error::ConfigError;
use solarthermal::scheduler::{CycleScheduler, ShutdownSignal};
use solarthermal::sensors::w1::W1SensorReader;

// ── Bootstrap helpers ─────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Result<SystemConfig> {
    let path = std::env::var_os(config::CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH), PathBuf::from);

    match config::load_from_path(&path) {
        Ok(cfg) => {
            info!("Config loaded from {}", path.display());
            Ok(cfg)
        }
        Err(ConfigError::NotFound) => {
            warn!("No config at {}, using defaults", path.display());
            Ok(SystemConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading config {}", path.display())),
    }
}

fn pump_line(gpio: u32, active_low: bool) -> Result<PumpLine<SysfsPin>> {
    // Claim the line at its "off" level.
    let pin = SysfsPin::export(gpio, active_low)
        .with_context(|| format!("claiming GPIO {gpio} for a pump relay"))?;
    Ok(PumpLine::new(pin, active_low))
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    init_logging();

    info!("╔══════════════════════════════════════╗");
    info!("║  SolarThermal v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = load_config()?;

    // ── 3. Shutdown on SIGINT / SIGTERM ───────────────────────
    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.request())
            .context("installing signal handler")?;
    }

    // ── 4. Hardware adapters ──────────────────────────────────
    let p = &config.pumps;
    let mut pumps = GpioPumpActuator::new(
        pump_line(p.solar_gpio, p.active_low)?,
        pump_line(p.exchanger_gpio, p.active_low)?,
        pump_line(p.boiler_gpio, p.active_low)?,
    );
    // Known state before the first cycle.
    if let Err(e) = pumps.all_off() {
        warn!("Initial all-off failed: {e}");
    }

    let sensors = W1SensorReader::new(&config.sensors, config.timing.sensor_timeout());
    let mut hw = HardwareAdapter::new(sensors, pumps);

    let mut datalog = config.datalog.enabled.then(|| CsvDataLog::new(&config.datalog));
    if datalog.is_none() {
        info!("Data log disabled");
    }
    let mut log_sink = LogEventSink::new();

    // ── 5. App service ────────────────────────────────────────
    let mut app = AppService::new(&config);
    app.start(&mut log_sink);

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let mut scheduler =
        CycleScheduler::new(SystemClock::new(), config.timing.cycle_period(), shutdown);
    let stats = scheduler.run(&mut app, &mut hw, &mut datalog, &mut log_sink);

    info!(
        "Stopped after {} cycles ({} overruns, uptime {} s)",
        stats.cycles,
        stats.overruns,
        scheduler.clock().uptime_secs()
    );
    match app.metrics().to_json() {
        Ok(json) => info!("Metrics: {json}"),
        Err(e) => warn!("Metrics not serialisable: {e}"),
    }
    for record in app.fault_log().iter() {
        info!("Fault history: #{} {} {}", record.cycle, record.kind, record.detail);
    }

    if !stats.pumps_confirmed_off {
        anyhow::bail!("pumps could not be confirmed off at shutdown");
    }
    Ok(())
}
