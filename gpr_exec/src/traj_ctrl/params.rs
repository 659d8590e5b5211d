//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Params {

    /// Maximum linear speed of the rover (and of the wheel edge during
    /// rotations).
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Acceleration limit used to shape the profiles.
    ///
    /// Units: meters/second^2
    pub max_accel_mss: f64,

    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// A drive phase is complete when the rover is closer than this to the
    /// end of the phase.
    ///
    /// Units: meters
    pub pos_stopband_m: f64,

    /// A rotation phase is complete when the heading is closer than this to
    /// the end of the phase.
    ///
    /// Units: radians
    pub ang_stopband_rad: f64,

    /// The rover is off course when its deviation from the phase start
    /// exceeds this multiple of the stopband.
    pub off_course_factor: f64,

    /// Smallest forward speed demanded while a drive phase is incomplete.
    ///
    /// Units: meters/second
    pub min_speed_ms: f64,

    /// Smallest turn rate demanded while a rotation phase is incomplete.
    ///
    /// Units: radians/second
    pub min_turn_rate_rads: f64,
}
