//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules of the solar-thermal controller:
//! sensor aggregation, the control state machine, safety evaluation and
//! diagnostics, orchestrated once per cycle.  All interaction with hardware
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
