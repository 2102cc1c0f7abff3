//! Gyroscope zero-rate calibration
//!
//! Run once at startup while the appliance is stationary:
//!
//! ```text
//! ┌─► wait GDA → candidate = raw gyro
//! │   wait GDA → check = raw gyro
//! │   residual = dps(check - candidate)
//! │   all |residual| < threshold ? ──yes──► baseline = candidate
//! └──────────────── no (attempts left) ◄──┘
//! ```
//!
//! Both data-ready waits and the number of candidate/check pairs are
//! bounded; running out of attempts is [`Error::CalibrationFailed`].

use crate::core::driver::ImuSource;
use crate::core::types::{AxisGroup, CalibrationBaseline, RawSample};
use crate::core::units::{raw_to_dps, GyroFullScale};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Calibration bounds (`[calibration]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Per-axis residual that counts as stationary (dps)
    #[serde(default = "default_threshold_dps")]
    pub threshold_dps: f32,

    /// Candidate/check pairs tried before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// STATUS_REG polls per data-ready wait
    #[serde(default = "default_ready_poll_limit")]
    pub ready_poll_limit: u32,
}

fn default_threshold_dps() -> f32 {
    0.7
}
fn default_max_attempts() -> u32 {
    500
}
fn default_ready_poll_limit() -> u32 {
    10_000
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            threshold_dps: default_threshold_dps(),
            max_attempts: default_max_attempts(),
            ready_poll_limit: default_ready_poll_limit(),
        }
    }
}

/// Capture the gyroscope zero-rate baseline
///
/// Returns the last candidate whose follow-up sample stayed below the
/// threshold on all three axes.
pub fn calibrate<S: ImuSource + ?Sized>(
    source: &mut S,
    settings: &CalibrationSettings,
) -> Result<CalibrationBaseline> {
    let full_scale = source.gyro_full_scale();
    let mut last_residual = None;

    log::info!(
        "Calibrating gyroscope (threshold {} dps, up to {} attempts)",
        settings.threshold_dps,
        settings.max_attempts
    );

    for attempt in 1..=settings.max_attempts {
        let Some(candidate) = wait_for_angular_rate(source, settings.ready_poll_limit)? else {
            log::warn!("Calibration attempt {}: no candidate sample", attempt);
            continue;
        };
        let Some(check) = wait_for_angular_rate(source, settings.ready_poll_limit)? else {
            log::warn!("Calibration attempt {}: no check sample", attempt);
            continue;
        };

        let baseline = CalibrationBaseline::new(candidate);
        let residual = residual_dps(&baseline.apply(&check), full_scale);
        last_residual = Some(residual);

        if residual.iter().all(|axis| axis.abs() < settings.threshold_dps) {
            log::info!(
                "Calibration complete after {} attempt(s): baseline {:?}",
                attempt,
                candidate.axes()
            );
            return Ok(baseline);
        }

        log::debug!(
            "Calibration attempt {}: residual {:.3?} dps above threshold",
            attempt,
            residual
        );
    }

    log::error!(
        "Calibration did not converge in {} attempts (last residual {:?})",
        settings.max_attempts,
        last_residual
    );
    Err(Error::CalibrationFailed {
        attempts: settings.max_attempts,
        last_residual_dps: last_residual,
    })
}

fn wait_for_angular_rate<S: ImuSource + ?Sized>(
    source: &mut S,
    poll_limit: u32,
) -> Result<Option<RawSample>> {
    for _ in 0..poll_limit {
        if source.data_ready(AxisGroup::AngularRate)? {
            return source.read_raw(AxisGroup::AngularRate).map(Some);
        }
    }
    Ok(None)
}

fn residual_dps(sample: &RawSample, full_scale: GyroFullScale) -> [f32; 3] {
    sample.axes().map(|axis| raw_to_dps(axis, full_scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::AccelFullScale;
    use crate::devices::lsm6dso::{Lsm6dso, SensorSettings, DEFAULT_ADDRESS};
    use crate::devices::sim::{SimulatedLsm6dso, SimulationConfig};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Gyro-only source replaying a fixed sample list
    struct ScriptedGyro {
        samples: VecDeque<RawSample>,
        ready: bool,
        reads: usize,
    }

    impl ScriptedGyro {
        fn new(samples: &[RawSample]) -> Self {
            Self {
                samples: samples.iter().copied().collect(),
                ready: true,
                reads: 0,
            }
        }
    }

    impl ImuSource for ScriptedGyro {
        fn data_ready(&mut self, _group: AxisGroup) -> Result<bool> {
            Ok(self.ready && !self.samples.is_empty())
        }

        fn read_raw(&mut self, _group: AxisGroup) -> Result<RawSample> {
            self.reads += 1;
            Ok(self.samples.pop_front().unwrap_or_default())
        }

        fn accel_full_scale(&self) -> AccelFullScale {
            AccelFullScale::G4
        }

        fn gyro_full_scale(&self) -> GyroFullScale {
            GyroFullScale::Dps2000
        }
    }

    fn settings(max_attempts: u32) -> CalibrationSettings {
        CalibrationSettings {
            max_attempts,
            ready_poll_limit: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_converges_on_small_residual() {
        // 9 counts = 0.63 dps, below 0.7
        let mut source = ScriptedGyro::new(&[RawSample::new(5, -3, 12), RawSample::new(14, -12, 3)]);
        let baseline = calibrate(&mut source, &settings(10)).unwrap();
        assert_eq!(baseline.raw(), RawSample::new(5, -3, 12));
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn test_baseline_is_last_candidate() {
        let mut source = ScriptedGyro::new(&[
            RawSample::new(0, 0, 0),
            RawSample::new(0, 0, 40),
            RawSample::new(7, 8, 9),
            RawSample::new(7, 8, 10),
        ]);
        let baseline = calibrate(&mut source, &settings(10)).unwrap();
        assert_eq!(baseline.raw(), RawSample::new(7, 8, 9));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 10 counts = exactly 0.7 dps
        let mut source = ScriptedGyro::new(&[RawSample::ZERO, RawSample::new(10, 0, 0)]);
        let err = calibrate(&mut source, &settings(1)).unwrap_err();
        assert!(matches!(err, Error::CalibrationFailed { attempts: 1, .. }));
    }

    #[test]
    fn test_one_noisy_axis_fails() {
        let mut samples = Vec::new();
        for i in 0..8 {
            samples.push(RawSample::new(0, 0, 0));
            samples.push(RawSample::new(1, 1, if i % 2 == 0 { 50 } else { -50 }));
        }
        let mut source = ScriptedGyro::new(&samples);

        match calibrate(&mut source, &settings(8)).unwrap_err() {
            Error::CalibrationFailed {
                attempts,
                last_residual_dps: Some(residual),
            } => {
                assert_eq!(attempts, 8);
                assert!(residual[2].abs() > 3.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ready_timeout_counts_as_attempt() {
        let mut source = ScriptedGyro::new(&[RawSample::ZERO]);
        source.ready = false;

        let err = calibrate(&mut source, &settings(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::CalibrationFailed {
                attempts: 3,
                last_residual_dps: None
            }
        ));
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn test_converges_on_simulated_noise() {
        let config = SimulationConfig {
            seed: 11,
            gyro_bias_dps: [0.35, -0.21, 0.14],
            gyro_noise_dps: 0.05,
            ..Default::default()
        };
        let sim = SimulatedLsm6dso::from_config(&config, DEFAULT_ADDRESS);
        let sensor_settings = SensorSettings {
            startup_delay: Duration::ZERO,
            ..Default::default()
        };
        let mut sensor = Lsm6dso::init(sim, DEFAULT_ADDRESS, &sensor_settings).unwrap();

        let baseline = calibrate(&mut sensor, &CalibrationSettings::default()).unwrap();
        // 0.35 dps bias at 70 mdps/LSB
        assert!((baseline.raw().axes()[0] - 5).abs() <= 3);
    }
}
