//! CSV data log driven by the real service loop.

use std::fs;
use std::time::Duration;

use solarthermal::adapters::datalog::CsvDataLog;
use solarthermal::app::service::AppService;
use solarthermal::config::{DataLogConfig, SystemConfig};
use solarthermal::error::SensorFault;
use solarthermal::scheduler::{CycleScheduler, ShutdownSignal};
use solarthermal::sensors::SensorId;

use crate::mock_hw::{FakeClock, MockHardware, RecordingSink, SUNNY, SimTime};

fn datalog_config(dir: &std::path::Path, rotate: u32) -> DataLogConfig {
    DataLogConfig {
        enabled: true,
        directory: dir.join("Data"),
        file_base: "_SolarThermal_Data_".into(),
        rotate_every_cycles: rotate,
    }
}

#[test]
fn scheduled_run_writes_rotating_files() {
    let tmp = tempfile::tempdir().unwrap();
    let config = datalog_config(tmp.path(), 2);

    let time = SimTime::new();
    let mut hw = MockHardware::new(time.clone()).with_readings(SUNNY);
    hw.readings[SensorId::CollectorAir as usize] = Err(SensorFault::Timeout);
    let mut log = CsvDataLog::new(&config);
    let mut sink = RecordingSink::default();
    let mut app = AppService::new(&SystemConfig::default());
    app.start(&mut sink);

    let mut scheduler = CycleScheduler::new(
        FakeClock::new(time),
        Duration::from_secs(10),
        ShutdownSignal::new(),
    )
    .with_max_cycles(5);
    let stats = scheduler.run(&mut app, &mut hw, &mut log, &mut sink);
    assert_eq!(stats.cycles, 5);

    let mut files: Vec<_> = fs::read_dir(&config.directory)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    assert_eq!(files.len(), 3);

    let first = fs::read_to_string(&files[0]).unwrap();
    let records: Vec<&str> = first.lines().skip(4).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0],
        "01.07.2024;12:00:00;1;01.07.2024 12:00:00;70,000;71,000;ERR;50,000;58,000;Transferring;1;1;0;1;"
    );
    // Second tick lands 10 s later on the wall clock.
    assert!(records[1].starts_with("01.07.2024;12:00:10;2;"));
}

#[test]
fn unwritable_directory_only_degrades_logging() {
    let tmp = tempfile::tempdir().unwrap();
    let blocked = tmp.path().join("Data");
    fs::write(&blocked, "a file where the directory should be").unwrap();
    let config = datalog_config(tmp.path(), 2000);

    let time = SimTime::new();
    let mut hw = MockHardware::new(time.clone()).with_readings(SUNNY);
    let mut log = CsvDataLog::new(&config);
    let mut sink = RecordingSink::default();
    let mut app = AppService::new(&SystemConfig::default());
    app.start(&mut sink);

    let mut scheduler = CycleScheduler::new(
        FakeClock::new(time),
        Duration::from_secs(10),
        ShutdownSignal::new(),
    )
    .with_max_cycles(3);
    let stats = scheduler.run(&mut app, &mut hw, &mut log, &mut sink);

    assert_eq!(stats.cycles, 3);
    assert!(app.is_logging_degraded());
    assert_eq!(app.metrics().logging_faults, 3);
    assert_eq!(hw.applies().count(), 3);
    assert!(stats.pumps_confirmed_off);
}
