//! KampanIO - vibration telemetry daemon for an appliance-mounted IMU
//!
//! Polls an LSM6DSO accelerometer/gyroscope over I2C, removes the gyroscope
//! zero-rate offset captured at startup and publishes every sample as a
//! simple text message and, optionally, a structured JSON document.
//!
//! ## Features
//!
//! - `linux` (default): Real I2C bus through `/dev/i2c-N`. Without it only
//!   the simulated sensor (`bus.kind = "sim"`) is available.

pub mod acquisition;
pub mod app;
pub mod calibration;
pub mod commands;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod reactor;
pub mod streaming;
pub mod transport;

// Re-export commonly used types
pub use app::KampanApp;
pub use config::AppConfig;
pub use error::{Error, Result};
