//! Raw count to engineering unit conversion.
//!
//! Each full-scale range fixes a linear sensitivity. Adding a range is a new
//! enum variant plus a table row; the conversion functions never change.
//!
//! | Accel range | mg/LSB | Gyro range | mdps/LSB |
//! |-------------|--------|------------|----------|
//! | ±2 g        | 0.061  | ±125 dps   | 4.375    |
//! | ±4 g        | 0.122  | ±250 dps   | 8.75     |
//! | ±8 g        | 0.244  | ±500 dps   | 17.50    |
//! | ±16 g       | 0.488  | ±1000 dps  | 35.0     |
//! |             |        | ±2000 dps  | 70.0     |

/// Accelerometer full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelFullScale {
    G2,
    #[default]
    G4,
    G8,
    G16,
}

/// Gyroscope full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GyroFullScale {
    Dps125,
    Dps250,
    Dps500,
    Dps1000,
    #[default]
    Dps2000,
}

/// (range, g, mg per LSB)
const ACCEL_SENSITIVITY: [(AccelFullScale, u16, f32); 4] = [
    (AccelFullScale::G2, 2, 0.061),
    (AccelFullScale::G4, 4, 0.122),
    (AccelFullScale::G8, 8, 0.244),
    (AccelFullScale::G16, 16, 0.488),
];

/// (range, dps, mdps per LSB)
const GYRO_SENSITIVITY: [(GyroFullScale, u16, f32); 5] = [
    (GyroFullScale::Dps125, 125, 4.375),
    (GyroFullScale::Dps250, 250, 8.75),
    (GyroFullScale::Dps500, 500, 17.50),
    (GyroFullScale::Dps1000, 1000, 35.0),
    (GyroFullScale::Dps2000, 2000, 70.0),
];

impl AccelFullScale {
    /// Look up a range by its magnitude in g
    pub fn from_g(g: u16) -> Option<Self> {
        ACCEL_SENSITIVITY
            .iter()
            .find(|(_, range_g, _)| *range_g == g)
            .map(|(range, _, _)| *range)
    }

    /// Range magnitude in g
    pub fn g(&self) -> u16 {
        self.row().1
    }

    /// Sensitivity in mg per LSB
    pub fn mg_per_lsb(&self) -> f32 {
        self.row().2
    }

    fn row(&self) -> (AccelFullScale, u16, f32) {
        ACCEL_SENSITIVITY
            .iter()
            .copied()
            .find(|(range, _, _)| range == self)
            .unwrap_or(ACCEL_SENSITIVITY[1])
    }
}

impl GyroFullScale {
    /// Look up a range by its magnitude in dps
    pub fn from_dps(dps: u16) -> Option<Self> {
        GYRO_SENSITIVITY
            .iter()
            .find(|(_, range_dps, _)| *range_dps == dps)
            .map(|(range, _, _)| *range)
    }

    /// Range magnitude in dps
    pub fn dps(&self) -> u16 {
        self.row().1
    }

    /// Sensitivity in mdps per LSB
    pub fn mdps_per_lsb(&self) -> f32 {
        self.row().2
    }

    fn row(&self) -> (GyroFullScale, u16, f32) {
        GYRO_SENSITIVITY
            .iter()
            .copied()
            .find(|(range, _, _)| range == self)
            .unwrap_or(GYRO_SENSITIVITY[4])
    }
}

/// Raw accelerometer counts to milli-g
#[inline]
pub fn raw_to_milli_g(raw: i16, full_scale: AccelFullScale) -> f32 {
    raw as f32 * full_scale.mg_per_lsb()
}

/// Raw gyroscope counts to milli-degrees per second
#[inline]
pub fn raw_to_milli_dps(raw: i16, full_scale: GyroFullScale) -> f32 {
    raw as f32 * full_scale.mdps_per_lsb()
}

/// Raw gyroscope counts to degrees per second
#[inline]
pub fn raw_to_dps(raw: i16, full_scale: GyroFullScale) -> f32 {
    raw_to_milli_dps(raw, full_scale) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_maps_to_zero() {
        assert_eq!(raw_to_milli_g(0, AccelFullScale::G4), 0.0);
        assert_eq!(raw_to_milli_dps(0, GyroFullScale::Dps2000), 0.0);
        assert_eq!(raw_to_dps(0, GyroFullScale::Dps2000), 0.0);
    }

    #[test]
    fn test_fs4_reference_values() {
        // 1 g at ±4 g is ~8197 counts
        assert_relative_eq!(raw_to_milli_g(8197, AccelFullScale::G4), 1000.034, epsilon = 1e-3);
        assert_relative_eq!(raw_to_milli_g(-1, AccelFullScale::G4), -0.122, epsilon = 1e-6);
        assert_relative_eq!(
            raw_to_milli_g(i16::MAX, AccelFullScale::G4),
            3997.574,
            epsilon = 1e-2
        );
        assert_relative_eq!(
            raw_to_milli_g(i16::MIN, AccelFullScale::G4),
            -3997.696,
            epsilon = 1e-2
        );
    }

    #[test]
    fn test_fs2000_reference_values() {
        assert_relative_eq!(raw_to_milli_dps(1, GyroFullScale::Dps2000), 70.0);
        assert_relative_eq!(raw_to_milli_dps(-100, GyroFullScale::Dps2000), -7000.0);
        assert_relative_eq!(raw_to_dps(10, GyroFullScale::Dps2000), 0.7, epsilon = 1e-6);
        assert_relative_eq!(
            raw_to_dps(i16::MAX, GyroFullScale::Dps2000),
            2293.69,
            epsilon = 1e-2
        );
    }

    #[test]
    fn test_other_ranges_are_table_driven() {
        assert_relative_eq!(raw_to_milli_g(1000, AccelFullScale::G16), 488.0, epsilon = 1e-3);
        assert_relative_eq!(raw_to_milli_dps(8, GyroFullScale::Dps125), 35.0);
    }

    #[test]
    fn test_range_lookup() {
        assert_eq!(AccelFullScale::from_g(4), Some(AccelFullScale::G4));
        assert_eq!(AccelFullScale::from_g(3), None);
        assert_eq!(GyroFullScale::from_dps(2000), Some(GyroFullScale::Dps2000));
        assert_eq!(GyroFullScale::from_dps(2001), None);
        assert_eq!(AccelFullScale::G8.g(), 8);
        assert_eq!(GyroFullScale::Dps500.dps(), 500);
    }
}
