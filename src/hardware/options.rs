//! Static register map of the pan-tilt-zoom controller.
//!
//! Each [`ActuatorOption`] is a logical control channel with a fixed register,
//! an inclusive value range and, for the lens motors only, a reset register.

use crate::error::{PtzError, PtzResult};
use serde::{Deserialize, Serialize};

/// Base of the raw option ids used by the controller's host tooling.
pub const OPT_BASE: u16 = 0x1000;

/// Logical control channel of the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorOption {
    /// Lens focus motor.
    Focus,
    /// Lens zoom motor.
    Zoom,
    /// Pan axis, degrees.
    MotorX,
    /// Tilt axis, degrees.
    MotorY,
    /// 1 opens the IR-cut filter, 0 closes it.
    IrCut,
    /// 1 places the controller in externally driven positioning mode.
    Mode,
}

/// Register metadata for one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Value register
    pub register: u8,
    /// Inclusive lower bound
    pub min_value: u16,
    /// Inclusive upper bound
    pub max_value: u16,
    /// Reference-return register, lens motors only
    pub reset_register: Option<u8>,
}

impl ActuatorOption {
    /// Every option, in raw-id order.
    pub const ALL: [ActuatorOption; 6] = [
        ActuatorOption::Focus,
        ActuatorOption::Zoom,
        ActuatorOption::MotorX,
        ActuatorOption::MotorY,
        ActuatorOption::IrCut,
        ActuatorOption::Mode,
    ];

    /// Register metadata.
    pub const fn spec(self) -> OptionSpec {
        match self {
            ActuatorOption::Focus => OptionSpec {
                register: 0x01,
                min_value: 0,
                max_value: 20000,
                reset_register: Some(0x01 + 0x0A),
            },
            ActuatorOption::Zoom => OptionSpec {
                register: 0x00,
                min_value: 3000,
                max_value: 20000,
                reset_register: Some(0x00 + 0x0A),
            },
            ActuatorOption::MotorX => OptionSpec {
                register: 0x05,
                min_value: 0,
                max_value: 180,
                reset_register: None,
            },
            ActuatorOption::MotorY => OptionSpec {
                register: 0x06,
                min_value: 0,
                max_value: 180,
                reset_register: None,
            },
            ActuatorOption::IrCut => OptionSpec {
                register: 0x0C,
                min_value: 0,
                max_value: 1,
                reset_register: None,
            },
            ActuatorOption::Mode => OptionSpec {
                register: 0x30,
                min_value: 0,
                max_value: 1,
                reset_register: None,
            },
        }
    }

    /// Raw id in the `0x1000 | n` scheme.
    pub const fn raw(self) -> u16 {
        let n = match self {
            ActuatorOption::Focus => 0x01,
            ActuatorOption::Zoom => 0x02,
            ActuatorOption::MotorX => 0x03,
            ActuatorOption::MotorY => 0x04,
            ActuatorOption::IrCut => 0x05,
            ActuatorOption::Mode => 0x06,
        };
        OPT_BASE | n
    }

    /// Inverse of [`raw`](Self::raw).
    pub fn from_raw(raw: u16) -> PtzResult<Self> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.raw() == raw)
            .ok_or(PtzError::UnknownOption(raw))
    }

    /// Clamp a requested value into this option's inclusive range.
    pub fn clamp(self, value: i32) -> u16 {
        let spec = self.spec();
        let clamped = value.clamp(i32::from(spec.min_value), i32::from(spec.max_value));
        // in range of u16 after the clamp above
        clamped as u16
    }
}
