//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Params {

    // ---- GEOMETRY ----

    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    // ---- CAPABILITIES ----

    /// Maximum speed of either wheel. Setpoints requiring a faster wheel are
    /// scaled down, preserving their curvature.
    ///
    /// Units: meters/second
    pub max_wheel_speed_ms: f64,

    /// Maximum magnitude of the heading hold trim.
    ///
    /// Units: radians/second
    pub max_head_trim_rads: f64,

    // ---- CONTROLLERS ----

    /// Wheel velocity controller gains, [k_p, k_i, k_d]
    pub wheel_pid_gains: [f64; 3],

    /// Heading hold controller gains, [k_p, k_i, k_d]
    pub head_pid_gains: [f64; 3],

    // ---- MOTOR MODEL ----

    /// Duty cycle per unit of wheel speed.
    ///
    /// Units: percent/(meters/second)
    pub motor_slope_pct_per_ms: f64,

    /// Duty cycle required to overcome static friction.
    ///
    /// Units: percent
    pub motor_static_offset_pct: f64,
}
