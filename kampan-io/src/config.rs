//! Configuration for KampanIO
//!
//! Loaded from a TOML file; every section and key is optional and falls back
//! to the values the appliance ships with.
//!
//! ```toml
//! [bus]
//! kind = "linux"            # "linux" or "sim"
//! device = "/dev/i2c-1"
//! address = 0x6A
//!
//! [sensor]
//! accel_odr_hz = 12.5
//! gyro_odr_hz = 12.5
//! accel_full_scale_g = 4
//! gyro_full_scale_dps = 2000
//!
//! [acquisition]
//! poll_period_ns = 1000000000
//!
//! [telemetry]
//! simple_topic = "DryerTelemetry"
//! simple_sink = { kind = "mqtt", address = "broker.local:1883" }
//! ```

use crate::calibration::CalibrationSettings;
use crate::core::units::{AccelFullScale, GyroFullScale};
use crate::devices::lsm6dso::{AccelCutoff, DEFAULT_ADDRESS, OutputDataRate, SensorSettings};
use crate::devices::sim::SimulationConfig;
use crate::error::{Error, Result};
use crate::streaming::{SinkConfig, SinkKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/kampan.toml";

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub calibration: CalibrationSettings,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Bus backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// Linux i2c-dev character device
    #[default]
    Linux,
    /// In-process simulated sensor
    Sim,
}

/// I2C bus configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,
    /// i2c-dev device path
    #[serde(default = "default_bus_device")]
    pub device: String,
    /// 7-bit sensor address
    #[serde(default = "default_bus_address")]
    pub address: u8,
    /// Per-transaction timeout; informational on Linux where the adapter
    /// driver owns the timeout
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
}

fn default_bus_device() -> String {
    "/dev/i2c-1".to_string()
}
fn default_bus_address() -> u8 {
    DEFAULT_ADDRESS
}
fn default_transaction_timeout_ms() -> u64 {
    100
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::default(),
            device: default_bus_device(),
            address: default_bus_address(),
            transaction_timeout_ms: default_transaction_timeout_ms(),
        }
    }
}

/// Sensor register configuration in physical units
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SensorConfig {
    #[serde(default = "default_odr_hz")]
    pub accel_odr_hz: f32,
    #[serde(default = "default_odr_hz")]
    pub gyro_odr_hz: f32,
    #[serde(default = "default_accel_full_scale_g")]
    pub accel_full_scale_g: u16,
    #[serde(default = "default_gyro_full_scale_dps")]
    pub gyro_full_scale_dps: u16,
    /// Accelerometer filter cut-off, e.g. `"odr_div_100"`
    #[serde(default = "default_accel_hp_cutoff")]
    pub accel_hp_cutoff: String,
    #[serde(default = "default_true")]
    pub accel_lpf2: bool,
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    #[serde(default = "default_reset_max_polls")]
    pub reset_max_polls: u32,
}

fn default_odr_hz() -> f32 {
    12.5
}
fn default_accel_full_scale_g() -> u16 {
    4
}
fn default_gyro_full_scale_dps() -> u16 {
    2000
}
fn default_accel_hp_cutoff() -> String {
    "odr_div_100".to_string()
}
fn default_true() -> bool {
    true
}
fn default_startup_delay_ms() -> u64 {
    50
}
fn default_reset_max_polls() -> u32 {
    1000
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            accel_odr_hz: default_odr_hz(),
            gyro_odr_hz: default_odr_hz(),
            accel_full_scale_g: default_accel_full_scale_g(),
            gyro_full_scale_dps: default_gyro_full_scale_dps(),
            accel_hp_cutoff: default_accel_hp_cutoff(),
            accel_lpf2: true,
            startup_delay_ms: default_startup_delay_ms(),
            reset_max_polls: default_reset_max_polls(),
        }
    }
}

impl SensorConfig {
    /// Resolve into driver settings, rejecting unsupported values
    pub fn settings(&self) -> Result<SensorSettings> {
        let odr = |hz: f32, group: &str| {
            OutputDataRate::from_hz(hz)
                .ok_or_else(|| Error::Config(format!("unsupported {} ODR {} Hz", group, hz)))
        };

        Ok(SensorSettings {
            accel_odr: odr(self.accel_odr_hz, "accelerometer")?,
            gyro_odr: odr(self.gyro_odr_hz, "gyroscope")?,
            accel_full_scale: AccelFullScale::from_g(self.accel_full_scale_g).ok_or_else(|| {
                Error::Config(format!(
                    "unsupported accelerometer range ±{} g",
                    self.accel_full_scale_g
                ))
            })?,
            gyro_full_scale: GyroFullScale::from_dps(self.gyro_full_scale_dps).ok_or_else(
                || {
                    Error::Config(format!(
                        "unsupported gyroscope range ±{} dps",
                        self.gyro_full_scale_dps
                    ))
                },
            )?,
            accel_cutoff: AccelCutoff::from_name(&self.accel_hp_cutoff).ok_or_else(|| {
                Error::Config(format!("unknown accel_hp_cutoff '{}'", self.accel_hp_cutoff))
            })?,
            accel_lpf2: self.accel_lpf2,
            startup_delay: Duration::from_millis(self.startup_delay_ms),
            reset_max_polls: self.reset_max_polls,
        })
    }
}

/// Acquisition timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Initial poll period; changeable at runtime with `setSensorPollTime`
    #[serde(default = "default_poll_period_ns")]
    pub poll_period_ns: u64,
}

fn default_poll_period_ns() -> u64 {
    1_000_000_000
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_period_ns: default_poll_period_ns(),
        }
    }
}

impl AcquisitionConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_nanos(self.poll_period_ns)
    }
}

/// Telemetry destinations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_simple_topic")]
    pub simple_topic: String,
    #[serde(default = "default_cloud_topic")]
    pub cloud_topic: String,
    #[serde(default)]
    pub simple_sink: SinkConfig,
    /// Structured telemetry is only produced when this is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_sink: Option<SinkConfig>,
}

fn default_simple_topic() -> String {
    "DryerTelemetry".to_string()
}
fn default_cloud_topic() -> String {
    "telemetry".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            simple_topic: default_simple_topic(),
            cloud_topic: default_cloud_topic(),
            simple_sink: SinkConfig::default(),
            cloud_sink: None,
        }
    }
}

/// Remote command server
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommandsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TCP bind address
    ///
    /// - `127.0.0.1:5560` - Localhost only
    /// - `0.0.0.0:5560` - All interfaces
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:5560".to_string()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log output (stdout or stderr)
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_output() -> String {
    "stdout".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use kampan_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("kampan.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the built-in defaults if `path` is the default
    /// location and does not exist
    pub fn load(path: &str) -> Result<Self> {
        if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
            log::warn!("{} not found, using built-in defaults", path);
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        self.sensor.settings()?;

        if self.sensor.reset_max_polls == 0 {
            return Err(Error::Config("sensor.reset_max_polls must be > 0".to_string()));
        }
        if self.acquisition.poll_period_ns == 0 {
            return Err(Error::Config("acquisition.poll_period_ns must be > 0".to_string()));
        }
        if self.calibration.max_attempts == 0 || self.calibration.ready_poll_limit == 0 {
            return Err(Error::Config(
                "calibration.max_attempts and ready_poll_limit must be > 0".to_string(),
            ));
        }
        if !(self.calibration.threshold_dps > 0.0) {
            return Err(Error::Config("calibration.threshold_dps must be > 0".to_string()));
        }
        if self.bus.address > 0x7F {
            return Err(Error::Config(format!(
                "bus.address {:#04x} is not a 7-bit address",
                self.bus.address
            )));
        }

        let sinks = std::iter::once(&self.telemetry.simple_sink).chain(&self.telemetry.cloud_sink);
        for sink in sinks {
            if sink.kind.is_network() && sink.address.is_none() {
                return Err(Error::Config(format!(
                    "{:?} sink requires an address",
                    sink.kind
                )));
            }
        }

        if !matches!(self.logging.output.as_str(), "stdout" | "stderr") {
            return Err(Error::Config(format!(
                "logging.output must be stdout or stderr, got '{}'",
                self.logging.output
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bus.kind, BusKind::Linux);
        assert_eq!(config.bus.device, "/dev/i2c-1");
        assert_eq!(config.bus.address, 0x6A);
        assert_eq!(config.acquisition.poll_period(), Duration::from_secs(1));
        assert_eq!(config.telemetry.simple_topic, "DryerTelemetry");
        assert_eq!(config.calibration.threshold_dps, 0.7);
        assert_eq!(config.commands.bind_address, "127.0.0.1:5560");
        assert!(config.telemetry.cloud_sink.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_default_sensor_settings() {
        let settings = SensorConfig::default().settings().unwrap();
        assert_eq!(settings, SensorSettings::default());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[bus]
kind = "sim"
address = 0x6B

[sensor]
accel_full_scale_g = 16
gyro_full_scale_dps = 500
accel_odr_hz = 104.0

[acquisition]
poll_period_ns = 250000000

[telemetry]
simple_sink = { kind = "udp", address = "127.0.0.1:5570" }
cloud_sink = { kind = "log" }

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.bus.kind, BusKind::Sim);
        assert_eq!(config.bus.address, 0x6B);
        assert_eq!(config.bus.device, "/dev/i2c-1");
        assert_eq!(config.acquisition.poll_period(), Duration::from_millis(250));
        assert_eq!(config.telemetry.simple_sink.kind, SinkKind::Udp);
        assert_eq!(
            config.telemetry.cloud_sink,
            Some(SinkConfig {
                kind: SinkKind::Log,
                address: None
            })
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.output, "stdout");

        let settings = config.sensor.settings().unwrap();
        assert_eq!(settings.accel_full_scale, AccelFullScale::G16);
        assert_eq!(settings.gyro_full_scale, GyroFullScale::Dps500);
        assert_eq!(settings.accel_odr, OutputDataRate::Hz104);
        assert_eq!(settings.gyro_odr, OutputDataRate::Hz12_5);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kampan.toml");

        let mut config = AppConfig::default();
        config.bus.kind = BusKind::Sim;
        config.telemetry.cloud_sink = Some(SinkConfig {
            kind: SinkKind::Udp,
            address: Some("127.0.0.1:5571".to_string()),
        });
        config.simulation.seed = 99;
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.acquisition.poll_period_ns = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.sensor.gyro_full_scale_dps = 3000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.sensor.accel_odr_hz = 100.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.telemetry.simple_sink.kind = SinkKind::Udp;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.telemetry.cloud_sink = Some(SinkConfig {
            kind: SinkKind::Mqtt,
            address: None,
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.calibration.max_attempts = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config: AppConfig = toml::from_str(include_str!("../kampan.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        assert!(AppConfig::load("/nonexistent/kampan.toml").is_err());
    }
}
