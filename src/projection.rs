//! Fisheye pixel to spherical angle projection.
//!
//! Maps a pixel position observed through an equidistant fisheye lens into
//! `(elevation, azimuth)` pointing angles in degrees.
//!
//! ## Conventions
//!
//! - The frame center is the optical axis and maps to elevation 90° (zenith).
//! - Azimuth is `atan2(dx, dy)`: the axis order is swapped relative to the usual
//!   `atan2(dy, dx)` so that 0° points along the sensor's +y direction and the
//!   angle grows toward +x. Downstream actuator mapping depends on this.
//! - Elevation follows the equidistant model `theta = alpha * r / f`, with `r`
//!   the radial distance on the sensor in millimetres, and is reported as
//!   `90 - theta`. It is not clamped to the lens field of view.
//!
//! # Example
//!
//! ```
//! use fisheye_ptz::projection::{Frame, LensModel};
//!
//! let lens = LensModel::default();
//! let frame = Frame::new(2432, 2048).unwrap();
//! let angle = lens.project(1216.0, 1024.0, frame);
//! assert_eq!(angle.elevation, 90.0);
//! assert_eq!(angle.azimuth, 0.0);
//! ```

use crate::error::{PtzError, PtzResult};
use serde::{Deserialize, Serialize};

/// Focal length of the fisheye lens in millimetres.
pub const FOCAL_LENGTH_MM: f64 = 1.7;

/// Pixel pitch of the camera sensor in millimetres.
pub const PIXEL_SIZE_MM: f64 = 0.00274;

/// Correction of the lens's real field of view against the ideal equidistant model.
pub const DEFAULT_ALPHA: f64 = 1.015;

/// Frame dimensions in pixels. Both are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    width: u32,
    height: u32,
}

impl Frame {
    /// Create a frame, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> PtzResult<Self> {
        if width == 0 || height == 0 {
            return Err(PtzError::Configuration(format!(
                "Frame dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Optical center in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }
}

/// Pixel position within (or slightly outside) a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelCoordinate {
    /// Column, pixels from the left edge
    pub x: f64,
    /// Row, pixels from the top edge
    pub y: f64,
}

/// Camera-space pointing direction in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngularCoordinate {
    /// Angle above the camera's horizontal plane, 90° at the optical axis.
    pub elevation: f64,
    /// Angle around the optical axis in (-180, 180].
    pub azimuth: f64,
}

impl AngularCoordinate {
    /// Angles in degrees.
    pub fn new(elevation: f64, azimuth: f64) -> Self {
        Self { elevation, azimuth }
    }

    /// Unit vector `(cos E cos A, cos E sin A, sin E)` for presentation layers.
    pub fn direction_vector(&self) -> [f64; 3] {
        let elevation = self.elevation.to_radians();
        let azimuth = self.azimuth.to_radians();
        [
            elevation.cos() * azimuth.cos(),
            elevation.cos() * azimuth.sin(),
            elevation.sin(),
        ]
    }
}

/// Calibration constants of an equidistant fisheye lens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensModel {
    /// Focal length in millimetres.
    pub focal_length_mm: f64,
    /// Sensor pixel pitch in millimetres.
    pub pixel_size_mm: f64,
    /// Field-of-view correction factor.
    pub alpha: f64,
    /// Multiplier applied to pixel offsets before measuring the radius.
    ///
    /// 1.0 for full-resolution frames; 2.0 when detections come from a frame
    /// downscaled by half.
    pub offset_scale: f64,
}

impl Default for LensModel {
    fn default() -> Self {
        Self {
            focal_length_mm: FOCAL_LENGTH_MM,
            pixel_size_mm: PIXEL_SIZE_MM,
            alpha: DEFAULT_ALPHA,
            offset_scale: 1.0,
        }
    }
}

impl LensModel {
    /// Azimuth in degrees of pixel `(x, y)`. Returns 0° at the exact center.
    pub fn azimuth(&self, x: f64, y: f64, frame: Frame) -> f64 {
        let (dx, dy) = offsets(x, y, frame);
        if dx == 0.0 && dy == 0.0 {
            return 0.0;
        }
        let degrees = dx.atan2(dy).to_degrees();
        // atan2 reaches -180 only for a negative-zero dx
        if degrees <= -180.0 {
            180.0
        } else {
            degrees
        }
    }

    /// Elevation in degrees of pixel `(x, y)`. Returns exactly 90° at the center.
    pub fn elevation(&self, x: f64, y: f64, frame: Frame) -> f64 {
        let (dx, dy) = offsets(x, y, frame);
        let dx = dx * self.offset_scale;
        let dy = dy * self.offset_scale;

        let radius_mm = dx.hypot(dy) * self.pixel_size_mm;
        let theta = self.alpha * radius_mm / self.focal_length_mm;
        90.0 - theta.to_degrees()
    }

    /// Both angles for a single pixel.
    pub fn project(&self, x: f64, y: f64, frame: Frame) -> AngularCoordinate {
        AngularCoordinate {
            elevation: self.elevation(x, y, frame),
            azimuth: self.azimuth(x, y, frame),
        }
    }

    /// [`project`](Self::project) for a detection center.
    pub fn project_pixel(&self, pixel: PixelCoordinate, frame: Frame) -> AngularCoordinate {
        self.project(pixel.x, pixel.y, frame)
    }

    /// Check that the constants are usable as divisors and scale factors.
    pub fn validate(&self) -> PtzResult<()> {
        let fields = [
            ("focal_length_mm", self.focal_length_mm),
            ("pixel_size_mm", self.pixel_size_mm),
            ("alpha", self.alpha),
            ("offset_scale", self.offset_scale),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(PtzError::Configuration(format!(
                    "lens.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn offsets(x: f64, y: f64, frame: Frame) -> (f64, f64) {
    let (cx, cy) = frame.center();
    (x - cx, y - cy)
}

/// Azimuth with the default lens constants, for raw `width`/`height` values.
pub fn azimuth(x: f64, y: f64, width: u32, height: u32) -> PtzResult<f64> {
    Ok(LensModel::default().azimuth(x, y, Frame::new(width, height)?))
}

/// Elevation with the default lens constants, for raw `width`/`height` values.
pub fn elevation(x: f64, y: f64, width: u32, height: u32) -> PtzResult<f64> {
    Ok(LensModel::default().elevation(x, y, Frame::new(width, height)?))
}
