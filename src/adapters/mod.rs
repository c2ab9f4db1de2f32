//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                   | Connects to                  |
//! |-------------|------------------------------|------------------------------|
//! | `datalog`   | DataLogger                   | Rotating CSV files on disk   |
//! | `hardware`  | SensorReader + PumpActuator  | One-wire bus, GPIO relays    |
//! | `log_sink`  | EventSink                    | `log` records                |
//! | `time`      | Clock                        | `Instant`, `chrono::Local`   |

pub mod datalog;
pub mod hardware;
pub mod log_sink;
pub mod time;
