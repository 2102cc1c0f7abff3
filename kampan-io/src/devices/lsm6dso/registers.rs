//! LSM6DSO register map and field encodings

use crate::core::units::{AccelFullScale, GyroFullScale};

// Identity
pub const WHO_AM_I: u8 = 0x0F;
pub const DEVICE_ID: u8 = 0x6C;

// Control registers
pub const CTRL1_XL: u8 = 0x10; // Accel ODR [7:4], FS [3:2], LPF2_XL_EN [1]
pub const CTRL2_G: u8 = 0x11; // Gyro ODR [7:4], FS [3:1]
pub const CTRL3_C: u8 = 0x12; // BDU [6], IF_INC [2], SW_RESET [0]
pub const CTRL8_XL: u8 = 0x17; // HPCF_XL [7:5], HP_SLOPE_XL_EN [2]
pub const CTRL9_XL: u8 = 0x18; // I3C_DISABLE [1]

// Status and output
pub const STATUS_REG: u8 = 0x1E; // GDA [1], XLDA [0]
pub const OUTX_L_G: u8 = 0x22; // Gyro X/Y/Z, 6 bytes little-endian
pub const OUTX_L_A: u8 = 0x28; // Accel X/Y/Z, 6 bytes little-endian

// Register bits
pub const CTRL1_XL_LPF2_XL_EN: u8 = 1 << 1;
pub const CTRL3_C_SW_RESET: u8 = 1 << 0;
pub const CTRL3_C_IF_INC: u8 = 1 << 2;
pub const CTRL3_C_BDU: u8 = 1 << 6;
pub const CTRL9_XL_I3C_DISABLE: u8 = 1 << 1;
pub const STATUS_XLDA: u8 = 1 << 0;
pub const STATUS_GDA: u8 = 1 << 1;

// Field masks
pub const ODR_MASK: u8 = 0xF0;
pub const FS_XL_MASK: u8 = 0x0C;
pub const FS_G_MASK: u8 = 0x0E;
pub const HPCF_XL_MASK: u8 = 0xE0;

/// Output data rate shared by accelerometer and gyroscope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputDataRate {
    PowerDown,
    #[default]
    Hz12_5,
    Hz26,
    Hz52,
    Hz104,
    Hz208,
    Hz416,
    Hz833,
    Hz1666,
    Hz3332,
    Hz6667,
}

/// (rate, Hz, ODR field value)
const ODR_TABLE: [(OutputDataRate, f32, u8); 11] = [
    (OutputDataRate::PowerDown, 0.0, 0x0),
    (OutputDataRate::Hz12_5, 12.5, 0x1),
    (OutputDataRate::Hz26, 26.0, 0x2),
    (OutputDataRate::Hz52, 52.0, 0x3),
    (OutputDataRate::Hz104, 104.0, 0x4),
    (OutputDataRate::Hz208, 208.0, 0x5),
    (OutputDataRate::Hz416, 416.0, 0x6),
    (OutputDataRate::Hz833, 833.0, 0x7),
    (OutputDataRate::Hz1666, 1666.0, 0x8),
    (OutputDataRate::Hz3332, 3332.0, 0x9),
    (OutputDataRate::Hz6667, 6667.0, 0xA),
];

impl OutputDataRate {
    /// Look up a rate by frequency; 0 means power-down
    pub fn from_hz(hz: f32) -> Option<Self> {
        ODR_TABLE
            .iter()
            .find(|(_, rate_hz, _)| (*rate_hz - hz).abs() < 1e-3)
            .map(|(rate, _, _)| *rate)
    }

    /// Nominal frequency in Hz
    pub fn hz(&self) -> f32 {
        self.row().1
    }

    /// Value for the ODR field (already shifted into bits [7:4])
    pub fn bits(&self) -> u8 {
        self.row().2 << 4
    }

    fn row(&self) -> (OutputDataRate, f32, u8) {
        ODR_TABLE
            .iter()
            .copied()
            .find(|(rate, _, _)| rate == self)
            .unwrap_or(ODR_TABLE[0])
    }
}

/// Accelerometer slope/high-pass and LPF2 cut-off (`HPCF_XL`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelCutoff {
    OdrDiv4,
    OdrDiv10,
    OdrDiv20,
    OdrDiv45,
    #[default]
    OdrDiv100,
    OdrDiv200,
    OdrDiv400,
    OdrDiv800,
}

impl AccelCutoff {
    /// Parse the configuration name (`"odr_div_100"`)
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "odr_div_4" => AccelCutoff::OdrDiv4,
            "odr_div_10" => AccelCutoff::OdrDiv10,
            "odr_div_20" => AccelCutoff::OdrDiv20,
            "odr_div_45" => AccelCutoff::OdrDiv45,
            "odr_div_100" => AccelCutoff::OdrDiv100,
            "odr_div_200" => AccelCutoff::OdrDiv200,
            "odr_div_400" => AccelCutoff::OdrDiv400,
            "odr_div_800" => AccelCutoff::OdrDiv800,
            _ => return None,
        })
    }

    /// Value for the HPCF_XL field (bits [7:5])
    pub fn bits(&self) -> u8 {
        let code = match self {
            AccelCutoff::OdrDiv4 => 0b000,
            AccelCutoff::OdrDiv10 => 0b001,
            AccelCutoff::OdrDiv20 => 0b010,
            AccelCutoff::OdrDiv45 => 0b011,
            AccelCutoff::OdrDiv100 => 0b100,
            AccelCutoff::OdrDiv200 => 0b101,
            AccelCutoff::OdrDiv400 => 0b110,
            AccelCutoff::OdrDiv800 => 0b111,
        };
        code << 5
    }
}

/// FS_XL field value for CTRL1_XL
pub fn accel_fs_bits(full_scale: AccelFullScale) -> u8 {
    match full_scale {
        AccelFullScale::G2 => 0x00,
        AccelFullScale::G16 => 0x04,
        AccelFullScale::G4 => 0x08,
        AccelFullScale::G8 => 0x0C,
    }
}

/// FS_G field value for CTRL2_G (FS_125 lives in bit 1)
pub fn gyro_fs_bits(full_scale: GyroFullScale) -> u8 {
    match full_scale {
        GyroFullScale::Dps125 => 0x02,
        GyroFullScale::Dps250 => 0x00,
        GyroFullScale::Dps500 => 0x04,
        GyroFullScale::Dps1000 => 0x08,
        GyroFullScale::Dps2000 => 0x0C,
    }
}

/// Decode the accelerometer full scale from CTRL1_XL
pub fn accel_fs_from_bits(ctrl1_xl: u8) -> AccelFullScale {
    match ctrl1_xl & FS_XL_MASK {
        0x04 => AccelFullScale::G16,
        0x08 => AccelFullScale::G4,
        0x0C => AccelFullScale::G8,
        _ => AccelFullScale::G2,
    }
}

/// Decode the gyroscope full scale from CTRL2_G
pub fn gyro_fs_from_bits(ctrl2_g: u8) -> GyroFullScale {
    if ctrl2_g & 0x02 != 0 {
        return GyroFullScale::Dps125;
    }
    match ctrl2_g & 0x0C {
        0x04 => GyroFullScale::Dps500,
        0x08 => GyroFullScale::Dps1000,
        0x0C => GyroFullScale::Dps2000,
        _ => GyroFullScale::Dps250,
    }
}

/// Replace `mask` bits of `current` with `value`
#[inline]
pub fn update_bits(current: u8, mask: u8, value: u8) -> u8 {
    (current & !mask) | (value & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odr_encoding() {
        assert_eq!(OutputDataRate::Hz12_5.bits(), 0x10);
        assert_eq!(OutputDataRate::Hz6667.bits(), 0xA0);
        assert_eq!(OutputDataRate::PowerDown.bits(), 0x00);
        assert_eq!(OutputDataRate::from_hz(12.5), Some(OutputDataRate::Hz12_5));
        assert_eq!(OutputDataRate::from_hz(100.0), None);
    }

    #[test]
    fn test_full_scale_bits_decode() {
        for fs in [
            AccelFullScale::G2,
            AccelFullScale::G4,
            AccelFullScale::G8,
            AccelFullScale::G16,
        ] {
            assert_eq!(accel_fs_from_bits(0x10 | accel_fs_bits(fs)), fs);
        }
        for fs in [
            GyroFullScale::Dps125,
            GyroFullScale::Dps250,
            GyroFullScale::Dps500,
            GyroFullScale::Dps1000,
            GyroFullScale::Dps2000,
        ] {
            assert_eq!(gyro_fs_from_bits(0x10 | gyro_fs_bits(fs)), fs);
        }
    }

    #[test]
    fn test_cutoff_default_is_odr_div_100() {
        assert_eq!(AccelCutoff::default().bits(), 0x80);
        assert_eq!(AccelCutoff::from_name("odr_div_100"), Some(AccelCutoff::OdrDiv100));
        assert_eq!(AccelCutoff::from_name("odr/100"), None);
    }

    #[test]
    fn test_update_bits_preserves_unrelated() {
        assert_eq!(update_bits(0b1010_0101, ODR_MASK, 0x10), 0b0001_0101);
        assert_eq!(update_bits(0xFF, CTRL3_C_BDU, 0), 0xBF);
    }
}
