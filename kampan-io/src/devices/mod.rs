//! Device implementations

pub mod lsm6dso;
pub mod sim;

use crate::config::{AppConfig, BusKind};
use crate::core::driver::ImuSource;
use crate::error::Result;
use lsm6dso::Lsm6dso;
use sim::SimulatedLsm6dso;

/// Initialized sensor behind the configured bus
pub type BoxedSource = Box<dyn ImuSource + Send>;

/// Open the configured bus and bring the sensor up
pub fn create_device(config: &AppConfig) -> Result<BoxedSource> {
    let settings = config.sensor.settings()?;
    let address = config.bus.address;

    match config.bus.kind {
        BusKind::Linux => open_linux(config, address, &settings),
        BusKind::Sim => {
            log::info!("Using simulated LSM6DSO at {:#04x}", address);
            let bus = SimulatedLsm6dso::from_config(&config.simulation, address);
            Ok(Box::new(Lsm6dso::init(bus, address, &settings)?))
        }
    }
}

#[cfg(feature = "linux")]
fn open_linux(
    config: &AppConfig,
    address: u8,
    settings: &lsm6dso::SensorSettings,
) -> Result<BoxedSource> {
    log::info!(
        "Opening {} (transaction timeout {} ms)",
        config.bus.device,
        config.bus.transaction_timeout_ms
    );
    let bus = crate::transport::open_i2c(&config.bus.device)?;
    Ok(Box::new(Lsm6dso::init(bus, address, settings)?))
}

#[cfg(not(feature = "linux"))]
fn open_linux(
    config: &AppConfig,
    _address: u8,
    _settings: &lsm6dso::SensorSettings,
) -> Result<BoxedSource> {
    Err(crate::error::Error::BusOpen {
        device: config.bus.device.clone(),
        reason: "built without the `linux` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AxisGroup;
    use crate::error::Error;

    fn sim_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.bus.kind = BusKind::Sim;
        config.sensor.startup_delay_ms = 0;
        config
    }

    #[test]
    fn test_create_sim_device() {
        let mut source = create_device(&sim_config()).unwrap();
        assert!(source.data_ready(AxisGroup::Acceleration).unwrap());
        let raw = source.read_raw(AxisGroup::Acceleration).unwrap();
        // 1000 mg at 0.122 mg/LSB plus noise
        assert!((i32::from(raw.axes()[2]) - 8197).abs() < 200);
    }

    #[test]
    fn test_invalid_sensor_config_rejected() {
        let mut config = sim_config();
        config.sensor.accel_full_scale_g = 3;
        assert!(matches!(create_device(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_linux_device() {
        let mut config = AppConfig::default();
        config.bus.device = "/dev/i2c-does-not-exist".to_string();
        assert!(matches!(
            create_device(&config),
            Err(crate::error::Error::BusOpen { .. })
        ));
    }
}
