//! Actuator drivers.

pub mod pump;
pub mod sysfs_gpio;
