//! Custom error types for the crate.
//!
//! `PtzError` is the single error type returned by the library.
//!
//! ## Error Hierarchy
//!
//! - **`BusOpen`**: the register bus device could not be opened. Fatal at startup.
//! - **`Bus`** / **`Io`**: a single register transaction failed. Surfaced to the
//!   caller of `get`/`set`, never retried beyond the busy polling.
//! - **`Config`** / **`Configuration`**: figment load failures and semantic
//!   validation failures respectively.
//! - **`Detection`**: a malformed detection record from the upstream source.
//! - **`FeatureNotEnabled`**: functionality compiled out via feature flags.
//!
//! Busy timeouts are reported through [`PollOutcome`](crate::polling::PollOutcome)
//! and out-of-range values are clamped; neither is an error.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type PtzResult<T> = std::result::Result<T, PtzError>;

/// Errors returned by the library.
#[derive(Error, Debug)]
pub enum PtzError {
    /// The bus device node could not be opened or bound to the chip.
    #[error("Failed to open register bus '{path}': {reason}")]
    BusOpen {
        /// Device node, e.g. `/dev/i2c-7`
        path: String,
        /// Driver error text
        reason: String,
    },

    /// A single register read or write failed.
    #[error("Bus transaction failed: {0}")]
    Bus(String),

    /// Reading the detection stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw option id outside the `0x1001..=0x1006` table.
    #[error("Unknown actuator option id 0x{0:04X}")]
    UnknownOption(u16),

    /// Config file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Config parsed but holds an unusable value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Malformed detection input line.
    #[error("Invalid detection input: {0}")]
    Detection(String),

    /// Compiled out via feature flags.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for PtzError {
    fn from(err: figment::Error) -> Self {
        PtzError::Config(Box::new(err))
    }
}
