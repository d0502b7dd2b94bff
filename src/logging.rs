//! Tracing initialization.
//!
//! `RUST_LOG` takes precedence over the configured level, so
//! `RUST_LOG=fisheye_ptz::hardware=trace` can zoom into bus traffic without
//! touching the config file.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Later calls are no-ops.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
