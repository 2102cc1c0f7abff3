//! Core data types for the acquisition pipeline.
//!
//! - [`RawSample`]: one unconverted x/y/z triple as read from the sensor
//! - [`CalibrationBaseline`]: zero-rate gyro reading captured at startup
//! - [`EngineeringSample`]: converted acceleration (mg) and angular rate (dps)

/// Sensor axis groups with independent data-ready flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisGroup {
    /// Accelerometer (XLDA flag)
    Acceleration,
    /// Gyroscope (GDA flag)
    AngularRate,
}

impl AxisGroup {
    /// Short name used in log messages
    pub fn name(&self) -> &'static str {
        match self {
            AxisGroup::Acceleration => "acceleration",
            AxisGroup::AngularRate => "angular rate",
        }
    }
}

/// Raw x/y/z register output in signed 16-bit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample(pub [i16; 3]);

impl RawSample {
    /// All axes zero
    pub const ZERO: RawSample = RawSample([0, 0, 0]);

    /// Size of one sample in the output registers
    pub const BYTES: usize = 6;

    /// Create from x, y, z counts
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self([x, y, z])
    }

    /// Decode from output registers (`OUTX_L, OUTX_H, OUTY_L, ...`)
    pub fn from_le_bytes(bytes: [u8; Self::BYTES]) -> Self {
        Self([
            i16::from_le_bytes([bytes[0], bytes[1]]),
            i16::from_le_bytes([bytes[2], bytes[3]]),
            i16::from_le_bytes([bytes[4], bytes[5]]),
        ])
    }

    /// Encode into output register layout
    pub fn to_le_bytes(&self) -> [u8; Self::BYTES] {
        let mut bytes = [0u8; Self::BYTES];
        for (chunk, axis) in bytes.chunks_exact_mut(2).zip(self.0.iter()) {
            chunk.copy_from_slice(&axis.to_le_bytes());
        }
        bytes
    }

    /// Per-axis subtraction clamped to the i16 range
    pub fn saturating_sub(&self, other: &RawSample) -> RawSample {
        RawSample([
            self.0[0].saturating_sub(other.0[0]),
            self.0[1].saturating_sub(other.0[1]),
            self.0[2].saturating_sub(other.0[2]),
        ])
    }

    /// Axis values
    #[inline]
    pub fn axes(&self) -> [i16; 3] {
        self.0
    }
}

/// Gyroscope zero-rate offset, captured once while the device is stationary.
///
/// Immutable after calibration; subtracted from every raw angular-rate sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationBaseline(RawSample);

impl CalibrationBaseline {
    /// Wrap a raw stationary reading as the baseline
    pub fn new(raw: RawSample) -> Self {
        Self(raw)
    }

    /// Baseline counts
    pub fn raw(&self) -> RawSample {
        self.0
    }

    /// Remove the zero-rate offset from a raw angular-rate sample
    #[inline]
    pub fn apply(&self, sample: &RawSample) -> RawSample {
        sample.saturating_sub(&self.0)
    }
}

/// Converted sample in engineering units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineeringSample {
    /// Acceleration in milli-g
    pub accel_mg: [f32; 3],
    /// Calibrated angular rate in degrees per second
    pub gyro_dps: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_little_endian() {
        let raw = RawSample::from_le_bytes([0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]);
        assert_eq!(raw.axes(), [1, -1, i16::MIN]);
    }

    #[test]
    fn test_encode_matches_decode_layout() {
        let raw = RawSample::new(0x1234, -2, 300);
        let bytes = raw.to_le_bytes();
        assert_eq!(bytes[0], 0x34);
        assert_eq!(bytes[1], 0x12);
        assert_eq!(RawSample::from_le_bytes(bytes), raw);
    }

    #[test]
    fn test_baseline_subtraction_saturates() {
        let baseline = CalibrationBaseline::new(RawSample::new(100, -100, 5));
        let corrected = baseline.apply(&RawSample::new(i16::MIN, i16::MAX, 5));
        assert_eq!(corrected.axes(), [i16::MIN, i16::MAX, 0]);
    }
}
