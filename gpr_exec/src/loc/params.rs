//! LocMgr parameters

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LocMgrParams {
    /// Encoder ticks per meter of wheel travel
    pub ticks_per_m: f64,

    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// Pose of the rover when the estimator starts, [x, y, theta].
    pub initial_pose: [f64; 3],

    /// If true the IMU yaw replaces the dead-reckoned heading.
    pub use_imu_heading: bool,
}
