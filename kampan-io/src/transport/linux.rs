//! Linux i2c-dev bus

use crate::error::{Error, Result};
use linux_embedded_hal::I2cdev;

/// Open an i2c-dev character device (e.g. `/dev/i2c-1`)
///
/// Bus speed and transaction timeout are properties of the kernel adapter;
/// they are not set per handle.
pub fn open_i2c(device: &str) -> Result<I2cdev> {
    let bus = I2cdev::new(device).map_err(|e| Error::BusOpen {
        device: device.to_string(),
        reason: e.to_string(),
    })?;

    log::info!("Opened I2C bus {}", device);
    Ok(bus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_bus_open_error() {
        let err = open_i2c("/dev/kampan-i2c-does-not-exist").err().unwrap();
        match err {
            Error::BusOpen { device, .. } => {
                assert_eq!(device, "/dev/kampan-i2c-does-not-exist")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
