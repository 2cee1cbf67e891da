//! Real board over `embedded-hal` drivers.
//!
//! Works with any blocking I2C bus and input pin implementation, such as
//! `linux-embedded-hal` on a Raspberry Pi. The ready pin should be
//! configured with a pull-up: the board pulls it low when idle.
//!
//! Transfers are short (ten bytes at bus speed), so the blocking calls run
//! directly on the calling task.

use crate::{
    HardwareError, Result,
    traits::{DispenseTransport, PinLevel, TransportKind},
};
use embedded_hal::digital::{self, InputPin};
use embedded_hal::i2c::{self, I2c};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Largest block written in one transaction: register byte plus payload.
const MAX_BLOCK: usize = 1 + dispenser_core::constants::FRAME_SIZE;

#[derive(Debug)]
pub struct HalTransport<I2C, PIN> {
    i2c: Mutex<I2C>,
    ready_pin: Mutex<PIN>,
    name: String,
}

impl<I2C, PIN> HalTransport<I2C, PIN>
where
    I2C: I2c + Send,
    PIN: InputPin + Send,
{
    pub fn new(i2c: I2C, ready_pin: PIN) -> Self {
        Self {
            i2c: Mutex::new(i2c),
            ready_pin: Mutex::new(ready_pin),
            name: "Dispenser Board".to_string(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Give the drivers back.
    pub fn release(self) -> (I2C, PIN) {
        (
            self.i2c.into_inner().unwrap_or_else(PoisonError::into_inner),
            self.ready_pin
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<I2C, PIN> DispenseTransport for HalTransport<I2C, PIN>
where
    I2C: I2c + Send,
    PIN: InputPin + Send,
{
    async fn write_block(&self, address: u8, register: u8, payload: &[u8]) -> Result<()> {
        if payload.len() + 1 > MAX_BLOCK {
            return Err(HardwareError::invalid_frame(format!(
                "{} byte payload does not fit one block",
                payload.len()
            )));
        }

        let mut block = [0u8; MAX_BLOCK];
        block[0] = register;
        block[1..=payload.len()].copy_from_slice(payload);

        lock(&self.i2c)
            .write(address, &block[..=payload.len()])
            .map_err(|e| match i2c::Error::kind(&e) {
                i2c::ErrorKind::NoAcknowledge(_) => {
                    HardwareError::disconnected(format!("no acknowledge from {address:#04x}"))
                }
                kind => HardwareError::bus(format!("{kind:?}")),
            })
    }

    async fn read_ready_line(&self) -> Result<PinLevel> {
        lock(&self.ready_pin)
            .is_high()
            .map(PinLevel::from_high)
            .map_err(|e| HardwareError::ready_line(format!("{:?}", digital::Error::kind(&e))))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Hardware
    }
}
