//! Register bus adapter implementations
//!
//! This module contains implementations of the [`RegisterBus`] trait,
//! providing word-level register I/O for different transports.

pub mod i2c_adapter;
pub mod mock_adapter;

pub use i2c_adapter::I2cAdapter;
pub use mock_adapter::{BusCall, MockRegisterBus};

use crate::error::PtzResult;
use async_trait::async_trait;

/// Word-wide register access on a single bus device.
///
/// Values are passed exactly as they travel on the wire; byte order
/// conversion belongs to the device protocol above this trait.
#[async_trait]
pub trait RegisterBus: Send {
    /// Read one word from `register`.
    async fn read_word(&mut self, register: u8) -> PtzResult<u16>;
    /// Write one word to `register`.
    async fn write_word(&mut self, register: u8, value: u16) -> PtzResult<()>;
}
