//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, may be absent)
//! 2. Environment variables (prefixed with `FISHEYE_PTZ_`)
//!
//! Every field has a default, so an empty file is a valid configuration.
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! FISHEYE_PTZ_APPLICATION__LOG_LEVEL=debug
//! FISHEYE_PTZ_ACTUATOR__ENABLED=true
//! FISHEYE_PTZ_DISPATCH__CYCLE_LENGTH=3
//! ```
//!
//! # Example
//!
//! ```toml
//! [lens]
//! alpha = 1.015
//!
//! [frame]
//! width = 2432
//! height = 2048
//!
//! [actuator]
//! enabled = true
//! bus = 7
//!
//! [dispatch]
//! cycle_length = 10
//! selection = "highest_confidence"
//! ```

use crate::error::{PtzError, PtzResult};
use crate::limiter::TargetSelection;
use crate::polling::PollPolicy;
use crate::projection::{Frame, LensModel};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FISHEYE_PTZ_";

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/fisheye_ptz.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtzConfig {
    /// `[application]`
    pub application: ApplicationConfig,
    /// `[lens]`
    pub lens: LensModel,
    /// `[frame]`
    pub frame: FrameConfig,
    /// `[actuator]`
    pub actuator: ActuatorConfig,
    /// `[dispatch]`
    pub dispatch: DispatchConfig,
    /// `[display]`
    pub display: DisplayConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Default frame size for detections that do not carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Pixels
    pub width: u32,
    /// Pixels
    pub height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 2432,
            height: 2048,
        }
    }
}

/// Pan-tilt controller connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Drive the actuator; when false angles are only computed and published
    pub enabled: bool,
    /// i2c bus number, opened as `/dev/i2c-{bus}`
    pub bus: u32,
    /// 7-bit chip address
    pub chip_address: u16,
    /// Busy wait budget in milliseconds
    pub busy_timeout_ms: u64,
    /// Busy poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bus: 7,
            chip_address: 0x0C,
            busy_timeout_ms: 5000,
            poll_interval_ms: 10,
        }
    }
}

impl ActuatorConfig {
    /// Busy-wait budget for the [`Focuser`](crate::hardware::Focuser).
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.busy_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

/// Dispatch throttling and target choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// One batch in `cycle_length` reaches the actuator
    pub cycle_length: u32,
    /// Which detection of a batch is dispatched
    pub selection: TargetSelection,
    /// Detections below this confidence are discarded
    pub min_confidence: f32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cycle_length: 10,
            selection: TargetSelection::First,
            min_confidence: 0.3,
        }
    }
}

/// Presentation refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display task tick in milliseconds
    pub refresh_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 50,
        }
    }
}

impl DisplayConfig {
    /// Display task tick.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl PtzConfig {
    /// Load configuration from a specific file path
    ///
    /// Precedence (highest first): environment variables, the file, built-in
    /// defaults. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> PtzResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(PtzConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> PtzResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(PtzError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        self.lens.validate()?;
        self.default_frame()?;

        if self.actuator.chip_address > 0x7F {
            return Err(PtzError::Configuration(format!(
                "actuator.chip_address 0x{:X} is not a 7-bit address",
                self.actuator.chip_address
            )));
        }
        if self.actuator.poll_interval_ms == 0 {
            return Err(PtzError::Configuration(
                "actuator.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.dispatch.cycle_length == 0 {
            return Err(PtzError::Configuration(
                "dispatch.cycle_length must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dispatch.min_confidence) {
            return Err(PtzError::Configuration(format!(
                "dispatch.min_confidence must be within [0, 1], got {}",
                self.dispatch.min_confidence
            )));
        }
        if self.display.refresh_interval_ms == 0 {
            return Err(PtzError::Configuration(
                "display.refresh_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `[frame]` as a validated [`Frame`].
    pub fn default_frame(&self) -> PtzResult<Frame> {
        Frame::new(self.frame.width, self.frame.height)
    }
}
