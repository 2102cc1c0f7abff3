//! Telemetry message formats
//!
//! Two renderings of the same [`EngineeringSample`]:
//!
//! | Channel | Format | Example |
//! |---------|--------|---------|
//! | Simple | `seq,ax,ay,az,gx,gy,gz`, six decimals | `3,12.200000,-0.122000,1000.500000,0.700000,0.000000,-1.400000` |
//! | Structured | flat JSON, string values, two decimals | `{"gX":"12.20",...,"rssi":"0"}` |
//!
//! In the structured message `gX/gY/gZ` carry acceleration (mg) and
//! `aX/aY/aZ` carry angular rate (dps); downstream dashboards are keyed on
//! these names.

use crate::core::types::EngineeringSample;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Published once after calibration, before the first cycle
pub const STARTING_SENTINEL: &str = "-1,-1,-1,-1,-1,-1,-1";

/// Render the simple delimited message
pub fn format_simple(sequence: u64, sample: &EngineeringSample) -> String {
    let [ax, ay, az] = sample.accel_mg;
    let [gx, gy, gz] = sample.gyro_dps;
    format!(
        "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
        sequence, ax, ay, az, gx, gy, gz
    )
}

/// Structured cloud telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredTelemetry {
    #[serde(rename = "gX")]
    pub g_x: String,
    #[serde(rename = "gY")]
    pub g_y: String,
    #[serde(rename = "gZ")]
    pub g_z: String,
    #[serde(rename = "aX")]
    pub a_x: String,
    #[serde(rename = "aY")]
    pub a_y: String,
    #[serde(rename = "aZ")]
    pub a_z: String,
    pub pressure: String,
    pub light_intensity: String,
    pub altitude: String,
    pub temp: String,
    pub rssi: String,
}

const PLACEHOLDER: &str = "0.00";

fn two_decimals(value: f32) -> String {
    format!("{:.2}", value)
}

impl StructuredTelemetry {
    /// Build from a converted sample; environmental fields are placeholders
    pub fn from_sample(sample: &EngineeringSample) -> Self {
        let [ax, ay, az] = sample.accel_mg;
        let [gx, gy, gz] = sample.gyro_dps;
        Self {
            g_x: two_decimals(ax),
            g_y: two_decimals(ay),
            g_z: two_decimals(az),
            a_x: two_decimals(gx),
            a_y: two_decimals(gy),
            a_z: two_decimals(gz),
            pressure: PLACEHOLDER.to_string(),
            light_intensity: PLACEHOLDER.to_string(),
            altitude: PLACEHOLDER.to_string(),
            temp: PLACEHOLDER.to_string(),
            rssi: "0".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Datagram envelope used by network sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<'a> {
    pub topic: &'a str,
    pub payload: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EngineeringSample {
        EngineeringSample {
            accel_mg: [12.2, -0.122, 1000.5],
            gyro_dps: [0.7, 0.0, -1.4],
        }
    }

    #[test]
    fn test_simple_format() {
        assert_eq!(
            format_simple(3, &sample()),
            "3,12.200000,-0.122000,1000.500000,0.700000,0.000000,-1.400000"
        );
    }

    #[test]
    fn test_simple_format_zero_sample() {
        assert_eq!(
            format_simple(0, &EngineeringSample::default()),
            "0,0.000000,0.000000,0.000000,0.000000,0.000000,0.000000"
        );
    }

    #[test]
    fn test_structured_field_mapping() {
        let msg = StructuredTelemetry::from_sample(&sample());
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(value["gX"], "12.20");
        assert_eq!(value["gZ"], "1000.50");
        assert_eq!(value["aX"], "0.70");
        assert_eq!(value["aZ"], "-1.40");
        assert_eq!(value["pressure"], "0.00");
        assert_eq!(value["temp"], "0.00");
        assert_eq!(value["rssi"], "0");
        assert_eq!(value.as_object().unwrap().len(), 11);
    }
}
