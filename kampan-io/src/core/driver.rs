//! ImuSource trait definition

use crate::core::types::{AxisGroup, RawSample};
use crate::core::units::{AccelFullScale, GyroFullScale};
use crate::error::Result;

/// Inertial sensor as seen by calibration and the acquisition loop.
///
/// Implemented by [`crate::devices::lsm6dso::Lsm6dso`]; tests may provide
/// synthetic sources.
pub trait ImuSource {
    /// Check the data-ready flag for one axis group
    fn data_ready(&mut self, group: AxisGroup) -> Result<bool>;

    /// Read the latest raw triple for one axis group
    fn read_raw(&mut self, group: AxisGroup) -> Result<RawSample>;

    /// Configured accelerometer range
    fn accel_full_scale(&self) -> AccelFullScale;

    /// Configured gyroscope range
    fn gyro_full_scale(&self) -> GyroFullScale;
}

impl<S: ImuSource + ?Sized> ImuSource for Box<S> {
    fn data_ready(&mut self, group: AxisGroup) -> Result<bool> {
        (**self).data_ready(group)
    }

    fn read_raw(&mut self, group: AxisGroup) -> Result<RawSample> {
        (**self).read_raw(group)
    }

    fn accel_full_scale(&self) -> AccelFullScale {
        (**self).accel_full_scale()
    }

    fn gyro_full_scale(&self) -> GyroFullScale {
        (**self).gyro_full_scale()
    }
}
