//! Camera-space to actuator-space pointing.
//!
//! The pan axis of the actuator has a different zero reference and handedness
//! than the camera azimuth, so targets on the positive-azimuth side are reached
//! by mirroring both axes:
//!
//! | azimuth | pan (X)     | tilt (Y)      |
//! |---------|-------------|---------------|
//! | A > 0   | 180 - A     | 180 - E       |
//! | A <= 0  | -A          | E (unchanged) |

use crate::adapters::RegisterBus;
use crate::error::PtzResult;
use crate::hardware::{ActuatorOption, Focuser};
use crate::polling::PollOutcome;
use crate::projection::AngularCoordinate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Actuator-space target in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuatorAngles {
    /// Pan
    pub x: f64,
    /// Tilt
    pub y: f64,
}

impl ActuatorAngles {
    /// Register values, truncated toward zero.
    pub fn truncated(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// Apply the hemisphere branch rule.
pub fn to_actuator_angles(angle: AngularCoordinate) -> ActuatorAngles {
    let AngularCoordinate {
        elevation,
        azimuth,
    } = angle;
    if azimuth > 0.0 {
        ActuatorAngles {
            x: 180.0 - azimuth,
            y: 180.0 - elevation,
        }
    } else {
        ActuatorAngles {
            x: -azimuth,
            y: elevation,
        }
    }
}

/// Translates pointing targets and sends them to the actuator.
pub struct PointingController<B: RegisterBus> {
    focuser: Focuser<B>,
    pending: Option<ActuatorAngles>,
}

impl<B: RegisterBus> PointingController<B> {
    /// Controller with no pending target.
    pub fn new(focuser: Focuser<B>) -> Self {
        Self {
            focuser,
            pending: None,
        }
    }

    /// Put the actuator into externally driven positioning mode.
    pub async fn engage(&mut self) -> PtzResult<()> {
        self.focuser.set(ActuatorOption::Mode, 1).await?;
        info!("actuator positioning mode engaged");
        Ok(())
    }

    /// Latest target selected for dispatch; overwritten on every dispatch.
    pub fn pending(&self) -> Option<ActuatorAngles> {
        self.pending
    }

    /// Map `angle` into actuator space and write pan then tilt.
    ///
    /// The two writes are independent: a failed pan write does not prevent the
    /// tilt write. The first error encountered is returned.
    pub async fn dispatch(&mut self, angle: AngularCoordinate) -> PtzResult<ActuatorAngles> {
        let target = to_actuator_angles(angle);
        self.pending = Some(target);
        let (x, y) = target.truncated();

        debug!(
            elevation = angle.elevation,
            azimuth = angle.azimuth,
            x,
            y,
            "dispatching pointing target"
        );

        let pan = self.focuser.set(ActuatorOption::MotorX, x).await;
        if let Err(ref e) = pan {
            error!(error = %e, x, "pan write failed");
        }
        let tilt = self.focuser.set(ActuatorOption::MotorY, y).await;
        if let Err(ref e) = tilt {
            error!(error = %e, y, "tilt write failed");
        }

        pan.and(tilt).map(|_| target)
    }

    /// Wait for the actuator to settle after the last dispatch.
    pub async fn settle(&mut self) -> PtzResult<PollOutcome> {
        self.focuser.wait_until_free().await
    }
}
