//! Identify an LSM6DSO on a Linux I2C bus and dump raw samples
//!
//! ```sh
//! cargo build --example i2c_probe --release --target armv7-unknown-linux-musleabihf
//! /tmp/i2c_probe /dev/i2c-1 0x6a
//! ```

use kampan_io::core::types::AxisGroup;
use kampan_io::devices::lsm6dso::{DEFAULT_ADDRESS, Lsm6dso, SensorSettings};
use kampan_io::transport::open_i2c;
use std::env;

const SAMPLES: usize = 20;

fn parse_address(text: &str) -> Result<u8, std::num::ParseIntError> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let device = args.get(1).map(String::as_str).unwrap_or("/dev/i2c-1");
    let address = match args.get(2) {
        Some(text) => parse_address(text)?,
        None => DEFAULT_ADDRESS,
    };

    log::info!("Probing {} at {:#04x}", device, address);
    let bus = open_i2c(device)?;
    let mut sensor = Lsm6dso::init(bus, address, &SensorSettings::default())?;

    let mut captured = 0;
    while captured < SAMPLES {
        if !sensor.data_ready(AxisGroup::Acceleration)? || !sensor.data_ready(AxisGroup::AngularRate)? {
            continue;
        }
        let accel = sensor.read_raw_acceleration()?;
        let gyro = sensor.read_raw_angular_rate()?;
        println!("{:3}  accel {:?}  gyro {:?}", captured, accel.axes(), gyro.axes());
        captured += 1;
    }
    Ok(())
}
