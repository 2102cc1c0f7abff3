//! Register transport over a two-wire bus
//!
//! Framing used by register-mapped sensors:
//!
//! ```text
//! write:  START ADDR+W  REG  DATA0 .. DATAn  STOP        (one transaction)
//! read:   START ADDR+W  REG  STOP                        (select pointer)
//!         START ADDR+R  DATA0 .. DATAn  STOP             (separate read)
//! ```
//!
//! Failures are reported as [`Error::BusIo`] with the failing [`BusPhase`].
//! There are no internal retries; the caller decides whether a failure
//! skips a cycle or aborts startup.

#[cfg(feature = "linux")]
mod linux;
#[cfg(feature = "linux")]
pub use linux::open_i2c;

use crate::error::{BusPhase, Error, Result};
use embedded_hal::i2c::I2c;

/// Largest register write payload (LSM6DSO multi-byte writes are ≤ 8 bytes)
pub const MAX_WRITE_PAYLOAD: usize = 15;

/// Register-level transport wrapping any `embedded_hal` I2C bus
pub struct RegisterBus<B> {
    bus: B,
}

impl<B: I2c> RegisterBus<B> {
    /// Wrap an opened bus
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Write `data` starting at `register` in a single transaction
    pub fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<()> {
        if data.len() > MAX_WRITE_PAYLOAD {
            return Err(Error::BusIo {
                phase: BusPhase::Write,
                address,
                register,
                reason: format!("payload of {} bytes exceeds frame", data.len()),
            });
        }

        let mut frame = [0u8; MAX_WRITE_PAYLOAD + 1];
        frame[0] = register;
        frame[1..=data.len()].copy_from_slice(data);
        let frame = &frame[..=data.len()];

        log::trace!("i2c write addr={:#04x} frame={:02x?}", address, frame);

        self.bus
            .write(address, frame)
            .map_err(|e| bus_error(BusPhase::Write, address, register, e))
    }

    /// Read `buffer.len()` bytes starting at `register`
    ///
    /// Selects the register pointer with a one-byte write, then issues a
    /// separate read. Both phases must succeed.
    pub fn read(&mut self, address: u8, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.bus
            .write(address, &[register])
            .map_err(|e| bus_error(BusPhase::Select, address, register, e))?;

        self.bus
            .read(address, buffer)
            .map_err(|e| bus_error(BusPhase::Read, address, register, e))?;

        log::trace!(
            "i2c read addr={:#04x} reg={:#04x} data={:02x?}",
            address,
            register,
            buffer
        );
        Ok(())
    }

    /// Borrow the underlying bus
    pub fn inner(&self) -> &B {
        &self.bus
    }

    /// Release the underlying bus
    pub fn into_inner(self) -> B {
        self.bus
    }
}

fn bus_error<E: core::fmt::Debug>(phase: BusPhase, address: u8, register: u8, err: E) -> Error {
    let err = Error::BusIo {
        phase,
        address,
        register,
        reason: format!("{:?}", err),
    };
    log::debug!("{}", err);
    err
}
