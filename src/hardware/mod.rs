//! Actuator drivers
//!
//! - [`options`]: the static register map of the pan-tilt-zoom controller
//! - [`focuser`]: the register protocol on top of a [`RegisterBus`](crate::adapters::RegisterBus)

pub mod focuser;
pub mod options;

pub use focuser::{Focuser, BUSY_REG_ADDR, CHIP_I2C_ADDR};
pub use options::{ActuatorOption, OptionSpec};
