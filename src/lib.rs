//! Core library for the fisheye_ptz application.
//!
//! Maps detections seen through an equidistant fisheye lens into spherical
//! pointing angles and drives a register-controlled pan-tilt actuator to them.
//!
//! Data flow:
//!
//! ```text
//! DetectionSource -> projection::LensModel -> (elevation, azimuth)
//!     -> limiter::FrameRateLimiter -> pointing::PointingController
//!     -> hardware::Focuser -> adapters::RegisterBus
//! ```
//!
//! # Features
//!
//! - `i2c` (default) - Linux i2c-dev access via the `i2cdev` crate

pub mod adapters;
pub mod config;
pub mod detection;
pub mod error;
pub mod hardware;
pub mod limiter;
pub mod logging;
pub mod pipeline;
pub mod pointing;
pub mod polling;
pub mod projection;

// Re-exports for convenience
pub use adapters::{I2cAdapter, MockRegisterBus, RegisterBus};
pub use config::PtzConfig;
pub use error::{PtzError, PtzResult};
pub use hardware::{ActuatorOption, Focuser};
pub use pipeline::{AngleSnapshot, TrackingPipeline};
pub use pointing::{to_actuator_angles, ActuatorAngles, PointingController};
pub use projection::{AngularCoordinate, Frame, LensModel};
