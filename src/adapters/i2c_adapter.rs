//! Linux i2c-dev adapter
//!
//! Wraps the `i2cdev` crate and issues SMBus word transactions to one slave
//! address. The device node is `/dev/i2c-{bus}`.
//!
//! SMBus transfers are blocking ioctls, so each one runs on the blocking
//! thread pool while the calling task awaits it.

use crate::adapters::RegisterBus;
use crate::error::{PtzError, PtzResult};
use async_trait::async_trait;

#[cfg(feature = "i2c")]
use i2cdev::core::I2CDevice;
#[cfg(feature = "i2c")]
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
#[cfg(feature = "i2c")]
use parking_lot::Mutex;
#[cfg(feature = "i2c")]
use std::sync::Arc;
#[cfg(feature = "i2c")]
use tracing::{debug, trace};

/// I2C adapter bound to a fixed chip address.
#[cfg_attr(not(feature = "i2c"), allow(dead_code))]
pub struct I2cAdapter {
    /// Device node (e.g., "/dev/i2c-7")
    path: String,

    /// 7-bit slave address
    chip_address: u16,

    #[cfg(feature = "i2c")]
    device: Arc<Mutex<LinuxI2CDevice>>,
}

/// Device node for an i2c bus number.
pub fn bus_path(bus: u32) -> String {
    format!("/dev/i2c-{}", bus)
}

impl I2cAdapter {
    /// Open `/dev/i2c-{bus}` and bind to `chip_address`.
    ///
    /// # Errors
    /// Returns [`PtzError::BusOpen`] if the device node cannot be opened or the
    /// slave address cannot be selected.
    #[cfg(feature = "i2c")]
    pub fn open(bus: u32, chip_address: u16) -> PtzResult<Self> {
        let path = bus_path(bus);
        let device = LinuxI2CDevice::new(&path, chip_address).map_err(|e| PtzError::BusOpen {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!(path = %path, chip_address, "I2C bus opened");
        Ok(Self {
            path,
            chip_address,
            device: Arc::new(Mutex::new(device)),
        })
    }

    /// Always fails: the crate was built without the `i2c` feature.
    #[cfg(not(feature = "i2c"))]
    pub fn open(bus: u32, chip_address: u16) -> PtzResult<Self> {
        let _ = (bus, chip_address);
        Err(PtzError::FeatureNotEnabled("i2c".to_string()))
    }

    /// Run one SMBus transaction on the blocking pool.
    #[cfg(feature = "i2c")]
    async fn transact<T, F>(&self, op: &'static str, register: u8, f: F) -> PtzResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut LinuxI2CDevice) -> Result<T, LinuxI2CError> + Send + 'static,
    {
        let device = Arc::clone(&self.device);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = device.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| PtzError::Bus(format!("I2C task panicked: {}", e)))?;

        trace!(op, register, chip_address = self.chip_address, "SMBus transfer");
        result.map_err(|e| {
            PtzError::Bus(format!(
                "{} of register 0x{:02X} at 0x{:02X} on {} failed: {}",
                op, register, self.chip_address, self.path, e
            ))
        })
    }
}

#[async_trait]
impl RegisterBus for I2cAdapter {
    #[cfg(feature = "i2c")]
    async fn read_word(&mut self, register: u8) -> PtzResult<u16> {
        self.transact("read", register, move |dev| dev.smbus_read_word_data(register))
            .await
    }

    #[cfg(feature = "i2c")]
    async fn write_word(&mut self, register: u8, value: u16) -> PtzResult<()> {
        self.transact("write", register, move |dev| {
            dev.smbus_write_word_data(register, value)
        })
        .await
    }

    #[cfg(not(feature = "i2c"))]
    async fn read_word(&mut self, _register: u8) -> PtzResult<u16> {
        Err(PtzError::FeatureNotEnabled("i2c".to_string()))
    }

    #[cfg(not(feature = "i2c"))]
    async fn write_word(&mut self, _register: u8, _value: u16) -> PtzResult<()> {
        Err(PtzError::FeatureNotEnabled("i2c".to_string()))
    }
}
