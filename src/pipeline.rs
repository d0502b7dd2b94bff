//! Detection-to-actuator control loop.
//!
//! The loop pulls one [`DetectionBatch`] at a time, projects every detection
//! into camera-space angles, publishes the angles, and on every Nth batch sends
//! one selected target to the [`PointingController`].
//!
//! Published angles live in a single-slot [`watch`] channel: each batch
//! overwrites the previous snapshot and readers only ever see the latest one.
//! [`spawn_display`] runs the presentation side as its own task, sampling that
//! slot at a fixed wall-clock interval.
//!
//! Dispatch failures are logged and counted; they never stop the loop.

use crate::adapters::RegisterBus;
use crate::config::PtzConfig;
use crate::detection::{Detection, DetectionBatch, DetectionSource};
use crate::error::{PtzError, PtzResult};
use crate::limiter::{FrameRateLimiter, TargetSelection};
use crate::pointing::{ActuatorAngles, PointingController};
use crate::projection::{AngularCoordinate, LensModel};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// A detection with its projected direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
    /// Source detection, unchanged
    pub detection: Detection,
    /// Projected camera-space direction
    pub angle: AngularCoordinate,
}

/// Latest published angles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngleSnapshot {
    /// Batch counter, 0 before the first batch.
    pub sequence: u64,
    /// One entry per detection that passed the confidence threshold.
    pub angles: Vec<AngularCoordinate>,
}

/// What happened to the actuator for one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Not this batch's turn in the cycle.
    Throttled,
    /// Its turn, but nothing to point at or no actuator attached.
    Idle,
    /// Both axes written; carries the untruncated actuator angles.
    Sent(ActuatorAngles),
    /// At least one axis write failed; carries the first error.
    Failed(String),
}

/// Result of [`TrackingPipeline::process_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Projected detections of the batch
    pub targets: Vec<TrackedTarget>,
    /// Actuator side of the iteration
    pub dispatch: DispatchOutcome,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches projected and published
    pub batches: u64,
    /// Malformed input lines and batches with an invalid frame
    pub skipped_batches: u64,
    /// Successful dispatches
    pub dispatches: u64,
    /// Dispatches with at least one failed write
    pub failed_dispatches: u64,
}

/// Tunables of the loop, usually taken from [`PtzConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Projection constants
    pub lens: LensModel,
    /// Dispatch one batch in this many
    pub cycle_length: u32,
    /// Target picked from a multi-detection batch
    pub selection: TargetSelection,
    /// Detections below this confidence are dropped
    pub min_confidence: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PtzConfig::default())
    }
}

impl From<&PtzConfig> for PipelineSettings {
    fn from(config: &PtzConfig) -> Self {
        Self {
            lens: config.lens,
            cycle_length: config.dispatch.cycle_length,
            selection: config.dispatch.selection,
            min_confidence: config.dispatch.min_confidence,
        }
    }
}

/// Detection-to-actuator control loop over a register bus `B`.
pub struct TrackingPipeline<B: RegisterBus> {
    settings: PipelineSettings,
    limiter: FrameRateLimiter,
    controller: Option<PointingController<B>>,
    snapshots: watch::Sender<AngleSnapshot>,
    summary: RunSummary,
}

impl<B: RegisterBus> TrackingPipeline<B> {
    /// Without a controller the loop only computes and publishes angles.
    pub fn new(settings: PipelineSettings, controller: Option<PointingController<B>>) -> Self {
        let (snapshots, _) = watch::channel(AngleSnapshot::default());
        Self {
            limiter: FrameRateLimiter::new(settings.cycle_length),
            settings,
            controller,
            snapshots,
            summary: RunSummary::default(),
        }
    }

    /// Reader handle on the latest published angles.
    pub fn subscribe(&self) -> watch::Receiver<AngleSnapshot> {
        self.snapshots.subscribe()
    }

    /// Counters so far.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Consume the pipeline, closing the snapshot channel, and hand back the
    /// controller.
    pub fn into_controller(self) -> Option<PointingController<B>> {
        self.controller
    }

    /// Project every detection above the confidence threshold.
    pub fn project_batch(&self, batch: &DetectionBatch) -> PtzResult<Vec<TrackedTarget>> {
        let frame = batch.frame()?;
        Ok(batch
            .detections
            .iter()
            .filter(|d| d.confidence >= self.settings.min_confidence)
            .map(|d| TrackedTarget {
                angle: self.settings.lens.project_pixel(d.center(), frame),
                detection: d.clone(),
            })
            .collect())
    }

    /// Run one iteration: project, publish, and dispatch if permitted.
    pub async fn process_batch(&mut self, batch: &DetectionBatch) -> PtzResult<BatchReport> {
        let targets = self.project_batch(batch)?;
        self.summary.batches += 1;

        let sequence = self.summary.batches;
        self.snapshots.send_replace(AngleSnapshot {
            sequence,
            angles: targets.iter().map(|t| t.angle).collect(),
        });

        if !self.limiter.tick() {
            return Ok(BatchReport {
                targets,
                dispatch: DispatchOutcome::Throttled,
            });
        }

        let selected = self
            .settings
            .selection
            .select(targets.iter().map(|t| t.detection.confidence));

        let dispatch = match (self.controller.as_mut(), selected) {
            (Some(controller), Some(index)) => {
                let target = &targets[index];
                match controller.dispatch(target.angle).await {
                    Ok(angles) => {
                        self.summary.dispatches += 1;
                        DispatchOutcome::Sent(angles)
                    }
                    Err(e) => {
                        self.summary.failed_dispatches += 1;
                        error!(sequence, error = %e, "dispatch failed, continuing");
                        DispatchOutcome::Failed(e.to_string())
                    }
                }
            }
            _ => DispatchOutcome::Idle,
        };

        debug!(sequence, targets = targets.len(), ?dispatch, "batch processed");
        Ok(BatchReport { targets, dispatch })
    }

    /// Drive the loop until the source reports end of stream.
    ///
    /// Malformed batches are logged and skipped; source I/O errors end the run.
    pub async fn run<S: DetectionSource + ?Sized>(&mut self, source: &mut S) -> PtzResult<RunSummary> {
        info!(
            cycle_length = self.limiter.cycle_length(),
            actuator = self.controller.is_some(),
            "tracking loop started"
        );

        loop {
            let batch = match source.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(PtzError::Detection(msg)) => {
                    warn!(%msg, "skipping malformed detection batch");
                    self.summary.skipped_batches += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Err(e) = self.process_batch(&batch).await {
                warn!(error = %e, "skipping detection batch");
                self.summary.skipped_batches += 1;
            }
        }

        info!(
            batches = self.summary.batches,
            dispatches = self.summary.dispatches,
            failed = self.summary.failed_dispatches,
            skipped = self.summary.skipped_batches,
            "tracking loop finished"
        );
        Ok(self.summary)
    }
}

/// Consumer of published angles.
pub trait Presenter: Send {
    /// Called once per refresh tick with the latest snapshot.
    fn present(&mut self, snapshot: &AngleSnapshot);
}

/// Logs the direction vectors of each new snapshot at debug level.
#[derive(Debug, Default)]
pub struct LogPresenter {
    last_sequence: Option<u64>,
}

impl Presenter for LogPresenter {
    fn present(&mut self, snapshot: &AngleSnapshot) {
        if self.last_sequence == Some(snapshot.sequence) {
            return;
        }
        self.last_sequence = Some(snapshot.sequence);
        for angle in &snapshot.angles {
            let [x, y, z] = angle.direction_vector();
            debug!(
                sequence = snapshot.sequence,
                elevation = angle.elevation,
                azimuth = angle.azimuth,
                x,
                y,
                z,
                "target direction"
            );
        }
    }
}

/// Sample the latest snapshot every `interval` and hand it to `presenter`.
///
/// The task ends after one final presentation once the pipeline (the sending
/// side) is dropped.
pub fn spawn_display<P>(
    mut snapshots: watch::Receiver<AngleSnapshot>,
    interval: Duration,
    mut presenter: P,
) -> JoinHandle<()>
where
    P: Presenter + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let closed = snapshots.has_changed().is_err();
            let snapshot = snapshots.borrow_and_update().clone();
            presenter.present(&snapshot);
            if closed {
                break;
            }
        }
    })
}
