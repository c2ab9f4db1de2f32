//! Fuzz target: config file parsing and validation
//!
//! Whatever the file contains, loading either yields a config that passes
//! its own validation or a typed error.  Never a panic.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use solarthermal::config::SystemConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<SystemConfig>(data) {
        if config.validate().is_ok() {
            assert!(config.control.start_delta_c > config.control.stop_delta_c);
            assert!(!config.timing.cycle_period().is_zero());
        }
    }
});
