//! Pan-tilt-zoom controller register protocol
//!
//! Protocol Overview:
//! - Transport: SMBus word transactions to chip address 0x0C
//! - Encoding: 16-bit registers, byte-swapped relative to host order on
//!   every read and write
//! - Busy flag: status register 0x04, non-zero while a motor is moving
//! - Timing: half-duplex; every get/set waits for the busy flag to clear first
//!
//! Waiting is bounded (5 s by default) and fails open: a controller that never
//! reports free delays the caller but does not stop it.
//!
//! # Example Usage
//!
//! ```no_run
//! use fisheye_ptz::hardware::{ActuatorOption, Focuser};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut focuser = Focuser::open(7)?;
//!
//!     // Pan to 45 degrees and wait for the move to finish
//!     focuser.set(ActuatorOption::MotorX, 45).await?;
//!     println!("Pan: {}°", focuser.get(ActuatorOption::MotorX).await?);
//!
//!     Ok(())
//! }
//! ```

use crate::adapters::{I2cAdapter, RegisterBus};
use crate::error::PtzResult;
use crate::hardware::options::ActuatorOption;
use crate::polling::{wait_while_busy, BusyProbe, PollOutcome, PollPolicy};
use async_trait::async_trait;
use tracing::{debug, trace};

/// Slave address of the controller.
pub const CHIP_I2C_ADDR: u16 = 0x0C;

/// Status register; non-zero while busy.
pub const BUSY_REG_ADDR: u8 = 0x04;

/// Driver for the pan-tilt-zoom controller.
///
/// Owns its bus exclusively. It is meant for a single control task and is not
/// safe to share without external locking.
pub struct Focuser<B: RegisterBus> {
    bus: B,
    poll: PollPolicy,
}

impl Focuser<I2cAdapter> {
    /// Open the controller on `/dev/i2c-{bus}` at the default chip address.
    ///
    /// # Errors
    /// Returns error if the bus cannot be opened. Callers should treat this as
    /// fatal.
    pub fn open(bus: u32) -> PtzResult<Self> {
        Ok(Self::new(I2cAdapter::open(bus, CHIP_I2C_ADDR)?))
    }
}

impl<B: RegisterBus> Focuser<B> {
    /// Create with the default 5 s / 10 ms busy-wait budget.
    pub fn new(bus: B) -> Self {
        Self::with_poll_policy(bus, PollPolicy::default())
    }

    /// Create with a custom busy-wait budget.
    pub fn with_poll_policy(bus: B, poll: PollPolicy) -> Self {
        Self { bus, poll }
    }

    /// Read a register and convert it to host byte order.
    pub async fn read(&mut self, register: u8) -> PtzResult<u16> {
        let raw = self.bus.read_word(register).await?;
        Ok(raw.swap_bytes())
    }

    /// Write a register, flooring negative values at 0 and saturating at
    /// `u16::MAX`.
    pub async fn write(&mut self, register: u8, value: i32) -> PtzResult<()> {
        let value = value.clamp(0, i32::from(u16::MAX)) as u16;
        trace!(register, value, "register write");
        self.bus.write_word(register, value.swap_bytes()).await
    }

    /// Live read of the status register. Never cached.
    pub async fn is_busy(&mut self) -> PtzResult<bool> {
        Ok(self.read(BUSY_REG_ADDR).await? != 0)
    }

    /// Poll until the controller is free or the wait budget is spent.
    ///
    /// A timeout is returned as [`PollOutcome::TimedOut`], not as an error.
    pub async fn wait_until_free(&mut self) -> PtzResult<PollOutcome> {
        let policy = self.poll;
        wait_while_busy(self, &policy).await
    }

    /// Current value of `option`.
    pub async fn get(&mut self, option: ActuatorOption) -> PtzResult<u16> {
        self.wait_until_free().await?;
        self.read(option.spec().register).await
    }

    /// Set `option`, clamped into its range, then wait for completion.
    pub async fn set(&mut self, option: ActuatorOption, value: i32) -> PtzResult<()> {
        self.set_with(option, value, true).await
    }

    /// Like [`set`](Self::set); `wait_after = false` returns as soon as the
    /// write is issued.
    pub async fn set_with(
        &mut self,
        option: ActuatorOption,
        value: i32,
        wait_after: bool,
    ) -> PtzResult<()> {
        self.wait_until_free().await?;

        let clamped = option.clamp(value);
        if i32::from(clamped) != value {
            debug!(?option, requested = value, clamped, "value clamped to range");
        }
        self.write(option.spec().register, i32::from(clamped)).await?;

        if wait_after {
            self.wait_until_free().await?;
        }
        Ok(())
    }

    /// Drive a lens motor back to its reference and then to its minimum.
    ///
    /// Options without a reset register are left untouched, with no bus
    /// traffic.
    pub async fn reset(&mut self, option: ActuatorOption) -> PtzResult<()> {
        self.reset_with(option, true).await
    }

    /// Like [`reset`](Self::reset) with optional trailing wait.
    pub async fn reset_with(&mut self, option: ActuatorOption, wait_after: bool) -> PtzResult<()> {
        let spec = option.spec();
        let Some(reset_register) = spec.reset_register else {
            trace!(?option, "no reset register, skipping");
            return Ok(());
        };

        self.wait_until_free().await?;
        self.write(reset_register, 0).await?;
        self.set(option, i32::from(spec.min_value)).await?;

        if wait_after {
            self.wait_until_free().await?;
        }
        debug!(?option, "option reset");
        Ok(())
    }
}

#[async_trait]
impl<B: RegisterBus> BusyProbe for Focuser<B> {
    async fn is_busy(&mut self) -> PtzResult<bool> {
        Focuser::is_busy(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BusCall, MockRegisterBus};

    #[tokio::test]
    async fn test_read_swaps_bytes() {
        let bus = MockRegisterBus::new();
        bus.preload(0x05, 0x0102);
        assert_eq!(bus.wire_word(0x05), Some(0x0201));

        let mut focuser = Focuser::new(bus);
        assert_eq!(focuser.read(0x05).await.unwrap(), 0x0102);
    }

    #[tokio::test]
    async fn test_write_swaps_and_floors_negative() {
        let bus = MockRegisterBus::new();
        let mut focuser = Focuser::new(bus.clone());

        focuser.write(0x05, 0x1234).await.unwrap();
        assert_eq!(bus.wire_word(0x05), Some(0x3412));

        focuser.write(0x06, -20).await.unwrap();
        assert_eq!(bus.value(0x06), Some(0));
    }

    #[tokio::test]
    async fn test_set_clamps_then_get_returns_clamped() {
        let bus = MockRegisterBus::new();
        let mut focuser = Focuser::new(bus);

        focuser.set(ActuatorOption::Zoom, 99999).await.unwrap();
        assert_eq!(focuser.get(ActuatorOption::Zoom).await.unwrap(), 20000);

        focuser.set(ActuatorOption::MotorX, -30).await.unwrap();
        assert_eq!(focuser.get(ActuatorOption::MotorX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_polls_before_and_after() {
        let bus = MockRegisterBus::new();
        let mut focuser = Focuser::new(bus.clone());

        focuser.set(ActuatorOption::MotorY, 30).await.unwrap();
        assert_eq!(
            bus.calls(),
            vec![
                BusCall::Read { register: BUSY_REG_ADDR },
                BusCall::Write {
                    register: 0x06,
                    value: 30u16.swap_bytes()
                },
                BusCall::Read { register: BUSY_REG_ADDR },
            ]
        );

        bus.clear_log();
        focuser
            .set_with(ActuatorOption::MotorY, 31, false)
            .await
            .unwrap();
        assert_eq!(bus.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_is_busy_never_cached() {
        let bus = MockRegisterBus::new();
        let mut focuser = Focuser::new(bus.clone());

        bus.busy_for(1);
        assert!(focuser.is_busy().await.unwrap());
        assert!(!focuser.is_busy().await.unwrap());
        assert_eq!(bus.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_without_register_is_noop() {
        let bus = MockRegisterBus::new();
        bus.preload(0x05, 77);
        let mut focuser = Focuser::new(bus.clone());

        focuser.reset(ActuatorOption::MotorX).await.unwrap();
        assert!(bus.calls().is_empty());
        assert_eq!(bus.value(0x05), Some(77));
    }

    #[tokio::test]
    async fn test_reset_zoom_sequence() {
        let bus = MockRegisterBus::new();
        let mut focuser = Focuser::new(bus.clone());

        focuser.reset(ActuatorOption::Zoom).await.unwrap();
        assert_eq!(bus.writes(), vec![(0x0A, 0), (0x00, 3000)]);
    }

    #[tokio::test]
    async fn test_write_failure_surfaces() {
        let bus = MockRegisterBus::new();
        bus.fail_register(0x05);
        let mut focuser = Focuser::new(bus);

        assert!(focuser.set(ActuatorOption::MotorX, 10).await.is_err());
    }
}
