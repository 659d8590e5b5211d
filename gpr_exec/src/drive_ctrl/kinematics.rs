//! Differential drive kinematics

use serde::Serialize;

/// Speeds of the left and right wheels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct WheelSpeeds {
    /// Units: meters/second
    pub left_ms: f64,

    /// Units: meters/second
    pub right_ms: f64,
}

impl WheelSpeeds {
    /// The larger of the two wheel speed magnitudes.
    pub fn max_abs(&self) -> f64 {
        self.left_ms.abs().max(self.right_ms.abs())
    }
}

/// Convert a forward speed and turn rate into wheel speeds.
pub fn state_vel_to_wheel_vel(forward_ms: f64, turn_rads: f64, wheel_base_m: f64) -> WheelSpeeds {
    let left_ms = forward_ms - turn_rads * wheel_base_m / 2.0;

    WheelSpeeds {
        left_ms,
        right_ms: 2.0 * forward_ms - left_ms,
    }
}

/// Convert wheel speeds into a forward speed and turn rate.
pub fn wheel_vel_to_state_vel(wheels: &WheelSpeeds, wheel_base_m: f64) -> (f64, f64) {
    (
        0.5 * (wheels.left_ms + wheels.right_ms),
        (wheels.right_ms - wheels.left_ms) / wheel_base_m,
    )
}
