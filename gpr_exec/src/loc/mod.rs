//! # Localisation module
//!
//! This module provides the pose estimate of the rover. Wheel odometry is integrated as a
//! differential drive dead-reckoning solution, with the heading replaced by the IMU's when an IMU
//! reading is available. GPS fixes are decoded and kept as the absolute position of the rover for
//! telemetry, they are not fused into the planar estimate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod mgr;
mod params;

pub use mgr::*;
pub use params::LocMgrParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use comms_if::eqpt::EqptError;
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose of the rover in the flattened survey plane.
///
/// The heading is measured anticlockwise from the X axis and is always kept in the range
/// (-pi, pi].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    /// Position in the survey plane.
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Heading.
    ///
    /// Units: radians
    theta_rad: f64,
}

/// The output of the estimator.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub pose: Pose2D,

    /// Speed along the rover's heading.
    ///
    /// Units: meters/second
    pub forward_vel_ms: f64,

    /// Rate of change of the heading.
    ///
    /// Units: radians/second
    pub yaw_rate_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("Failed to load LocMgr parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Equipment error: {0}")]
    EqptError(#[from] EqptError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2D {
    /// Create a new pose, wrapping the heading.
    pub fn new(x_m: f64, y_m: f64, theta_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            theta_rad: wrap_pi(theta_rad),
        }
    }

    /// Create a pose from a position vector and heading.
    pub fn from_parts(position_m: Vector2<f64>, theta_rad: f64) -> Self {
        Self {
            position_m,
            theta_rad: wrap_pi(theta_rad),
        }
    }

    pub fn x(&self) -> f64 {
        self.position_m[0]
    }

    pub fn y(&self) -> f64 {
        self.position_m[1]
    }

    /// Heading in the range (-pi, pi].
    pub fn theta(&self) -> f64 {
        self.theta_rad
    }

    /// Set the heading, wrapping it into (-pi, pi].
    pub fn set_theta(&mut self, theta_rad: f64) {
        self.theta_rad = wrap_pi(theta_rad);
    }

    /// Unit vector pointing along the heading.
    pub fn forward(&self) -> Vector2<f64> {
        Vector2::new(self.theta_rad.cos(), self.theta_rad.sin())
    }

    /// Transform a point given in this pose's frame into the parent frame.
    pub fn transform_point(&self, point_m: &Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(self.theta_rad) * point_m + self.position_m
    }

    /// Distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose2D) -> f64 {
        (other.position_m - self.position_m).norm()
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Estimate {
    /// An estimate at the given pose with zero velocity.
    pub fn at_rest(pose: Pose2D) -> Self {
        Self {
            pose,
            forward_vel_ms: 0.0,
            yaw_rate_rads: 0.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_pose_wraps_heading() {
        let p = Pose2D::new(0.0, 0.0, 3.0 * PI);
        assert!((p.theta() - PI).abs() < 1e-12);

        let mut p = Pose2D::new(1.0, 2.0, 0.0);
        p.set_theta(-PI - 0.5);
        assert!((p.theta() - (PI - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_transform_point() {
        let p = Pose2D::new(1.0, 1.0, PI / 2.0);
        let t = p.transform_point(&Vector2::new(2.0, 0.0));
        assert!((t[0] - 1.0).abs() < 1e-12);
        assert!((t[1] - 3.0).abs() < 1e-12);
    }
}
