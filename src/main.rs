//! Tracking loop binary.
//!
//! Reads detection batches as JSON lines on stdin, publishes their angles and,
//! with `--ptz`, points the actuator at the selected target.
//!
//! ```bash
//! detector | fisheye-ptz --ptz --bus 7 --cycle 10
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use fisheye_ptz::config::{PtzConfig, DEFAULT_CONFIG_PATH};
use fisheye_ptz::detection::JsonLinesSource;
use fisheye_ptz::pipeline::{spawn_display, LogPresenter, PipelineSettings, TrackingPipeline};
use fisheye_ptz::{logging, Focuser, I2cAdapter, PointingController};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fisheye-ptz", about = "Point a pan-tilt actuator at fisheye detections")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Drive the actuator (overrides actuator.enabled)
    #[arg(long)]
    ptz: bool,

    /// i2c bus number (overrides actuator.bus)
    #[arg(long)]
    bus: Option<u32>,

    /// Dispatch one batch in N (overrides dispatch.cycle_length)
    #[arg(long)]
    cycle: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PtzConfig::load_from(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if args.ptz {
        config.actuator.enabled = true;
    }
    if let Some(bus) = args.bus {
        config.actuator.bus = bus;
    }
    if let Some(cycle) = args.cycle {
        config.dispatch.cycle_length = cycle;
    }
    config.validate().context("Invalid configuration")?;

    logging::init(&config.application.log_level);

    let controller = if config.actuator.enabled {
        let adapter = I2cAdapter::open(config.actuator.bus, config.actuator.chip_address)
            .context("Failed to initialize pan-tilt controller")?;
        let focuser = Focuser::with_poll_policy(adapter, config.actuator.poll_policy());
        let mut controller = PointingController::new(focuser);
        controller
            .engage()
            .await
            .context("Failed to enable positioning mode")?;
        Some(controller)
    } else {
        info!("actuator disabled, computing angles only");
        None
    };

    let mut pipeline: TrackingPipeline<I2cAdapter> =
        TrackingPipeline::new(PipelineSettings::from(&config), controller);
    let display = spawn_display(
        pipeline.subscribe(),
        config.display.refresh_interval(),
        LogPresenter::default(),
    );

    let mut source =
        JsonLinesSource::new(tokio::io::stdin()).with_default_frame(config.default_frame()?);
    let summary = pipeline.run(&mut source).await?;

    // Releasing the pipeline closes the snapshot channel and ends the display task
    if let Some(mut controller) = pipeline.into_controller() {
        let outcome = controller
            .settle()
            .await
            .context("Failed to read actuator status")?;
        if !outcome.is_ready() {
            warn!("actuator still moving at exit");
        }
    }
    display.await.context("Display task panicked")?;

    info!(
        batches = summary.batches,
        dispatches = summary.dispatches,
        failed = summary.failed_dispatches,
        "done"
    );
    Ok(())
}
