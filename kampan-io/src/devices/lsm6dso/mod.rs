//! LSM6DSO accelerometer + gyroscope driver
//!
//! Register-level driver over any `embedded_hal` I2C bus. Startup follows the
//! sequence the appliance firmware has always used:
//!
//! ```text
//! settle delay (50 ms)
//!   → WHO_AM_I == 0x6C
//!   → CTRL3_C.SW_RESET, poll until clear (bounded)
//!   → CTRL9_XL.I3C_DISABLE
//!   → CTRL3_C.BDU | IF_INC
//!   → CTRL1_XL / CTRL2_G: ODR + full scale
//!   → CTRL8_XL.HPCF_XL (ODR/100), CTRL1_XL.LPF2_XL_EN
//! ```
//!
//! Every configuration write is read-modify-write so bits outside the field
//! being set keep their reset values.

pub mod registers;

use crate::core::driver::ImuSource;
use crate::core::types::{AxisGroup, RawSample};
use crate::core::units::{AccelFullScale, GyroFullScale};
use crate::error::{Error, Result};
use crate::transport::RegisterBus;
use embedded_hal::i2c::I2c;
use registers::*;
use std::thread;
use std::time::Duration;

pub use registers::{AccelCutoff, OutputDataRate};

/// Default 7-bit address (SDO/SA0 pulled high)
pub const DEFAULT_ADDRESS: u8 = 0x6A;

/// Sensor configuration applied at startup
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    pub accel_odr: OutputDataRate,
    pub gyro_odr: OutputDataRate,
    pub accel_full_scale: AccelFullScale,
    pub gyro_full_scale: GyroFullScale,
    pub accel_cutoff: AccelCutoff,
    /// Route accelerometer output through the second low-pass stage
    pub accel_lpf2: bool,
    /// Settle time after power-up before the identity check
    pub startup_delay: Duration,
    /// Upper bound on CTRL3_C polls while waiting for SW_RESET to clear
    pub reset_max_polls: u32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            accel_odr: OutputDataRate::Hz12_5,
            gyro_odr: OutputDataRate::Hz12_5,
            accel_full_scale: AccelFullScale::G4,
            gyro_full_scale: GyroFullScale::Dps2000,
            accel_cutoff: AccelCutoff::OdrDiv100,
            accel_lpf2: true,
            startup_delay: Duration::from_millis(50),
            reset_max_polls: 1000,
        }
    }
}

/// Bus handle bound to one device address
pub struct DeviceContext<B> {
    bus: RegisterBus<B>,
    address: u8,
}

impl<B: I2c> DeviceContext<B> {
    pub fn new(bus: B, address: u8) -> Self {
        Self {
            bus: RegisterBus::new(bus),
            address,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.bus.read(self.address, register, &mut value)?;
        Ok(value[0])
    }

    pub fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<()> {
        self.bus.read(self.address, register, buffer)
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.bus.write(self.address, register, &[value])
    }

    /// Read-modify-write of the `mask` bits of one register
    pub fn modify_register(&mut self, register: u8, mask: u8, value: u8) -> Result<()> {
        let current = self.read_register(register)?;
        let updated = update_bits(current, mask, value);
        if updated != current {
            self.write_register(register, updated)?;
        }
        Ok(())
    }
}

/// LSM6DSO inertial sensor
pub struct Lsm6dso<B: I2c> {
    ctx: DeviceContext<B>,
    accel_full_scale: AccelFullScale,
    gyro_full_scale: GyroFullScale,
}

impl<B: I2c> Lsm6dso<B> {
    /// Bind to a device without touching it
    ///
    /// Full-scale ranges assume power-on defaults until [`configure`](Self::configure).
    pub fn new(bus: B, address: u8) -> Self {
        Self {
            ctx: DeviceContext::new(bus, address),
            accel_full_scale: AccelFullScale::G2,
            gyro_full_scale: GyroFullScale::Dps250,
        }
    }

    /// Full startup: settle, identify, reset, configure
    pub fn init(bus: B, address: u8, settings: &SensorSettings) -> Result<Self> {
        let mut sensor = Self::new(bus, address);

        if !settings.startup_delay.is_zero() {
            thread::sleep(settings.startup_delay);
        }

        let id = sensor.identify()?;
        log::info!("LSM6DSO found at {:#04x} (WHO_AM_I={:#04x})", address, id);

        let polls = sensor.reset(settings.reset_max_polls)?;
        log::debug!("LSM6DSO reset complete after {} polls", polls);

        sensor.configure(settings)?;
        log::info!(
            "LSM6DSO configured: accel {} Hz ±{} g, gyro {} Hz ±{} dps",
            settings.accel_odr.hz(),
            settings.accel_full_scale.g(),
            settings.gyro_odr.hz(),
            settings.gyro_full_scale.dps()
        );

        Ok(sensor)
    }

    /// Read WHO_AM_I and verify the device identity
    pub fn identify(&mut self) -> Result<u8> {
        let id = self.ctx.read_register(WHO_AM_I)?;
        if id != DEVICE_ID {
            log::error!(
                "Unexpected WHO_AM_I {:#04x} at {:#04x} (expected {:#04x})",
                id,
                self.ctx.address(),
                DEVICE_ID
            );
            return Err(Error::DeviceNotFound {
                expected: DEVICE_ID,
                actual: id,
            });
        }
        Ok(id)
    }

    /// Software reset; returns the number of polls until SW_RESET cleared
    pub fn reset(&mut self, max_polls: u32) -> Result<u32> {
        self.ctx
            .modify_register(CTRL3_C, CTRL3_C_SW_RESET, CTRL3_C_SW_RESET)?;

        for poll in 1..=max_polls {
            if self.ctx.read_register(CTRL3_C)? & CTRL3_C_SW_RESET == 0 {
                self.accel_full_scale = AccelFullScale::G2;
                self.gyro_full_scale = GyroFullScale::Dps250;
                return Ok(poll);
            }
        }

        log::error!("LSM6DSO SW_RESET still set after {} polls", max_polls);
        Err(Error::ResetTimeout { polls: max_polls })
    }

    /// Apply output rates, ranges and the accelerometer filter chain
    pub fn configure(&mut self, settings: &SensorSettings) -> Result<()> {
        self.ctx
            .modify_register(CTRL9_XL, CTRL9_XL_I3C_DISABLE, CTRL9_XL_I3C_DISABLE)?;
        self.ctx.modify_register(
            CTRL3_C,
            CTRL3_C_BDU | CTRL3_C_IF_INC,
            CTRL3_C_BDU | CTRL3_C_IF_INC,
        )?;

        self.ctx.modify_register(
            CTRL1_XL,
            ODR_MASK | FS_XL_MASK,
            settings.accel_odr.bits() | accel_fs_bits(settings.accel_full_scale),
        )?;
        self.ctx.modify_register(
            CTRL2_G,
            ODR_MASK | FS_G_MASK,
            settings.gyro_odr.bits() | gyro_fs_bits(settings.gyro_full_scale),
        )?;

        self.ctx
            .modify_register(CTRL8_XL, HPCF_XL_MASK, settings.accel_cutoff.bits())?;
        let lpf2 = if settings.accel_lpf2 {
            CTRL1_XL_LPF2_XL_EN
        } else {
            0
        };
        self.ctx
            .modify_register(CTRL1_XL, CTRL1_XL_LPF2_XL_EN, lpf2)?;

        self.accel_full_scale = settings.accel_full_scale;
        self.gyro_full_scale = settings.gyro_full_scale;
        Ok(())
    }

    /// Data-ready flag for one axis group (STATUS_REG)
    pub fn data_ready(&mut self, group: AxisGroup) -> Result<bool> {
        let status = self.ctx.read_register(STATUS_REG)?;
        let flag = match group {
            AxisGroup::Acceleration => STATUS_XLDA,
            AxisGroup::AngularRate => STATUS_GDA,
        };
        Ok(status & flag != 0)
    }

    pub fn read_raw_acceleration(&mut self) -> Result<RawSample> {
        self.read_output(OUTX_L_A)
    }

    pub fn read_raw_angular_rate(&mut self) -> Result<RawSample> {
        self.read_output(OUTX_L_G)
    }

    fn read_output(&mut self, register: u8) -> Result<RawSample> {
        let mut bytes = [0u8; RawSample::BYTES];
        self.ctx.read_registers(register, &mut bytes)?;
        Ok(RawSample::from_le_bytes(bytes))
    }
}

impl<B: I2c> ImuSource for Lsm6dso<B> {
    fn data_ready(&mut self, group: AxisGroup) -> Result<bool> {
        Lsm6dso::data_ready(self, group)
    }

    fn read_raw(&mut self, group: AxisGroup) -> Result<RawSample> {
        match group {
            AxisGroup::Acceleration => self.read_raw_acceleration(),
            AxisGroup::AngularRate => self.read_raw_angular_rate(),
        }
    }

    fn accel_full_scale(&self) -> AccelFullScale {
        self.accel_full_scale
    }

    fn gyro_full_scale(&self) -> GyroFullScale {
        self.gyro_full_scale
    }
}

impl<B: I2c> Drop for Lsm6dso<B> {
    fn drop(&mut self) {
        log::info!("Closing LSM6DSO at {:#04x}", self.ctx.address());
    }
}
