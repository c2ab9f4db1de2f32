//! Solar-thermal pump controller library.
//!
//! Exposes the control core and its adapters for the binary and for the
//! host integration tests.  Nothing here needs a Raspberry Pi: the sysfs
//! one-wire and GPIO paths are configuration, and every port has a mock in
//! `tests/`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod safety;
pub mod scheduler;
pub mod sensors;
