//! Mock register bus for testing
//!
//! Simulates the pan-tilt controller's register file without hardware. It
//! provides:
//! - A register file holding wire-order words
//! - A status register that can be held busy for N polls or forever
//! - Controllable failure injection
//! - Call logging for test verification
//!
//! Clones share state, so a test can keep a handle after moving the bus into
//! a [`Focuser`](crate::hardware::Focuser).

use crate::adapters::RegisterBus;
use crate::error::{PtzError, PtzResult};
use crate::hardware::focuser::BUSY_REG_ADDR;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One recorded bus transaction, values in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCall {
    /// Word read
    Read {
        /// Register address
        register: u8,
    },
    /// Word write
    Write {
        /// Register address
        register: u8,
        /// Wire-order value
        value: u16,
    },
}

#[derive(Default)]
struct MockDevice {
    registers: HashMap<u8, u16>,
    busy_polls_remaining: u32,
    always_busy: bool,
    fail_next: bool,
    failing_registers: HashSet<u8>,
    calls: Vec<BusCall>,
}

/// Mock register bus
///
/// # Example
///
/// ```
/// use fisheye_ptz::adapters::MockRegisterBus;
///
/// let bus = MockRegisterBus::new();
/// bus.preload(0x05, 90);
/// assert_eq!(bus.value(0x05), Some(90));
/// ```
#[derive(Clone, Default)]
pub struct MockRegisterBus {
    device: Arc<Mutex<MockDevice>>,
}

impl MockRegisterBus {
    /// Idle device, all registers reading 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report busy for the next `polls` status reads.
    pub fn busy_for(&self, polls: u32) {
        self.device.lock().busy_polls_remaining = polls;
    }

    /// Report busy on every status read until cleared.
    pub fn set_always_busy(&self, busy: bool) {
        self.device.lock().always_busy = busy;
    }

    /// Fail the next transaction, whatever it is.
    pub fn inject_next_failure(&self) {
        self.device.lock().fail_next = true;
    }

    /// Fail every transaction touching `register`.
    pub fn fail_register(&self, register: u8) {
        self.device.lock().failing_registers.insert(register);
    }

    /// Store a host-order value as the device would hold it.
    pub fn preload(&self, register: u8, value: u16) {
        self.device.lock().registers.insert(register, value.swap_bytes());
    }

    /// Register content as it sits on the wire.
    pub fn wire_word(&self, register: u8) -> Option<u16> {
        self.device.lock().registers.get(&register).copied()
    }

    /// Register content in host order.
    pub fn value(&self, register: u8) -> Option<u16> {
        self.wire_word(register).map(u16::swap_bytes)
    }

    /// Every transaction so far, failed ones included.
    pub fn calls(&self) -> Vec<BusCall> {
        self.device.lock().calls.clone()
    }

    /// Writes only, as `(register, host-order value)`.
    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.device
            .lock()
            .calls
            .iter()
            .filter_map(|call| match *call {
                BusCall::Write { register, value } => Some((register, value.swap_bytes())),
                BusCall::Read { .. } => None,
            })
            .collect()
    }

    /// Forget recorded transactions; register contents are kept.
    pub fn clear_log(&self) {
        self.device.lock().calls.clear();
    }
}

impl MockDevice {
    fn check_failure(&mut self, register: u8) -> PtzResult<()> {
        if std::mem::take(&mut self.fail_next) || self.failing_registers.contains(&register) {
            return Err(PtzError::Bus(format!(
                "Injected failure on register 0x{:02X}",
                register
            )));
        }
        Ok(())
    }

    fn status_word(&mut self) -> u16 {
        let busy = if self.always_busy {
            true
        } else if self.busy_polls_remaining > 0 {
            self.busy_polls_remaining -= 1;
            true
        } else {
            false
        };
        if busy {
            1u16.swap_bytes()
        } else {
            0
        }
    }
}

#[async_trait]
impl RegisterBus for MockRegisterBus {
    async fn read_word(&mut self, register: u8) -> PtzResult<u16> {
        let mut device = self.device.lock();
        device.calls.push(BusCall::Read { register });
        device.check_failure(register)?;

        if register == BUSY_REG_ADDR {
            return Ok(device.status_word());
        }
        Ok(device.registers.get(&register).copied().unwrap_or(0))
    }

    async fn write_word(&mut self, register: u8, value: u16) -> PtzResult<()> {
        let mut device = self.device.lock();
        device.calls.push(BusCall::Write { register, value });
        device.check_failure(register)?;

        device.registers.insert(register, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_is_wire_identity() {
        let mut bus = MockRegisterBus::new();
        bus.write_word(0x05, 0x5A00).await.unwrap();
        assert_eq!(bus.read_word(0x05).await.unwrap(), 0x5A00);
        assert_eq!(bus.value(0x05), Some(0x005A));
    }

    #[tokio::test]
    async fn test_busy_countdown() {
        let mut bus = MockRegisterBus::new();
        bus.busy_for(2);
        assert_ne!(bus.read_word(BUSY_REG_ADDR).await.unwrap(), 0);
        assert_ne!(bus.read_word(BUSY_REG_ADDR).await.unwrap(), 0);
        assert_eq!(bus.read_word(BUSY_REG_ADDR).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let mut bus = MockRegisterBus::new();
        bus.inject_next_failure();
        assert!(bus.write_word(0x06, 1).await.is_err());
        assert!(bus.write_word(0x06, 1).await.is_ok());
        assert_eq!(bus.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let handle = MockRegisterBus::new();
        let mut bus = handle.clone();
        bus.write_word(0x30, 1u16.swap_bytes()).await.unwrap();
        assert_eq!(handle.writes(), vec![(0x30, 1)]);
        handle.clear_log();
        assert!(bus.calls().is_empty());
    }
}
