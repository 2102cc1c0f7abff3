//! Core abstractions for the acquisition pipeline.
//!
//! - [`driver::ImuSource`]: Trait implemented by sensor drivers
//! - [`types`]: Raw and converted samples, calibration baseline
//! - [`units`]: Full-scale ranges and unit conversion

pub mod driver;
pub mod types;
pub mod units;
