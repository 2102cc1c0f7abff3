//! Simulated sensor configuration (`[simulation]` section)
//!
//! | Parameter | Default | Unit |
//! |-----------|---------|------|
//! | seed | 0 (entropy) | |
//! | accel_mg | [0, 0, 1000] | mg |
//! | accel_noise_mg | 1.5 | mg (1σ) |
//! | gyro_bias_dps | [0.35, -0.21, 0.14] | dps |
//! | gyro_noise_dps | 0.05 | dps (1σ) |
//! | data_ready_dropout | 0.0 | probability |

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Noise seed; 0 draws from entropy
    #[serde(default)]
    pub seed: u64,

    /// Stationary acceleration (gravity on +Z when level)
    #[serde(default = "default_accel_mg")]
    pub accel_mg: [f32; 3],

    #[serde(default = "default_accel_noise_mg")]
    pub accel_noise_mg: f32,

    /// Zero-rate offset the calibration has to remove
    #[serde(default = "default_gyro_bias_dps")]
    pub gyro_bias_dps: [f32; 3],

    #[serde(default = "default_gyro_noise_dps")]
    pub gyro_noise_dps: f32,

    /// Probability that a STATUS_REG read reports no new data
    #[serde(default)]
    pub data_ready_dropout: f32,
}

fn default_accel_mg() -> [f32; 3] {
    [0.0, 0.0, 1000.0]
}
fn default_accel_noise_mg() -> f32 {
    1.5
}
fn default_gyro_bias_dps() -> [f32; 3] {
    [0.35, -0.21, 0.14]
}
fn default_gyro_noise_dps() -> f32 {
    0.05
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            accel_mg: default_accel_mg(),
            accel_noise_mg: default_accel_noise_mg(),
            gyro_bias_dps: default_gyro_bias_dps(),
            gyro_noise_dps: default_gyro_noise_dps(),
            data_ready_dropout: 0.0,
        }
    }
}

impl SimulationConfig {
    /// Noise-free stationary sensor reading exactly zero
    pub fn quiet() -> Self {
        Self {
            seed: 1,
            accel_mg: [0.0; 3],
            accel_noise_mg: 0.0,
            gyro_bias_dps: [0.0; 3],
            gyro_noise_dps: 0.0,
            data_ready_dropout: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: SimulationConfig = toml::from_str("seed = 42\ngyro_noise_dps = 2.0").unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.gyro_noise_dps, 2.0);
        assert_eq!(config.accel_mg, [0.0, 0.0, 1000.0]);
        assert_eq!(config.data_ready_dropout, 0.0);
    }
}
