//! # Inertial measurement unit

use serde::{Deserialize, Serialize};

use super::EqptError;

/// A single synchronous reading of the IMU's fusion outputs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    /// Orientation as euler angles, [roll, pitch, yaw].
    ///
    /// Units: radians
    pub euler_rad: [f64; 3],

    /// Orientation as a quaternion, [w, x, y, z].
    pub quaternion: [f64; 4],

    /// Acceleration with gravity removed, body frame [x, y, z].
    ///
    /// Units: meters/second^2
    pub linear_accel_ms2: [f64; 3],
}

/// An IMU providing orientation and linear acceleration.
pub trait Imu {
    /// Bring up the IMU, including putting it into its fusion mode.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Read the latest orientation and linear acceleration.
    fn get_reading(&mut self) -> Result<ImuReading, EqptError>;
}

impl ImuReading {
    /// Yaw angle of the reading.
    pub fn yaw_rad(&self) -> f64 {
        self.euler_rad[2]
    }
}
