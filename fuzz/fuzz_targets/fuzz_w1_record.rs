//! Fuzz target: `parse_record`
//!
//! Feeds arbitrary bytes to the one-wire record parser as if they had been
//! read from a `w1_slave` file.  It must never panic, and every accepted
//! value must be finite.  Range checks belong to the aggregator.
//!
//! cargo fuzz run fuzz_w1_record

#![no_main]

use libfuzzer_sys::fuzz_target;
use solarthermal::sensors::w1::parse_record;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(celsius) = parse_record(text) {
        assert!(celsius.is_finite(), "accepted {celsius}");
    }
});
