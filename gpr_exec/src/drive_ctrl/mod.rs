//! # Drive control module
//!
//! Drive control turns a forward speed and turn rate setpoint into duty cycles for the left and
//! right motors of the differential drive.
//!
//! Each cycle:
//!
//! 1. If the turn setpoint is (near) zero a heading hold controller adds a turn rate trim which
//!    keeps the rover on the heading it had when the turn setpoint went to zero.
//! 2. The setpoint is converted into left and right wheel speeds.
//! 3. A velocity PID per wheel compares the wheel setpoints to the wheel speeds derived from the
//!    localisation estimate, and adds its output to the setpoint.
//! 4. A linear motor model converts the resulting speeds into percentage duty cycles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod controllers;
mod kinematics;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use controllers::*;
pub use kinematics::*;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Turn rates below this magnitude are considered to be zero.
///
/// Units: radians/second
pub const TURN_ZERO_THRESHOLD_RADS: f64 = 0.001;

/// Wheel speeds below this magnitude produce a zero duty cycle.
///
/// Units: meters/second
pub const SPEED_ZERO_THRESHOLD_MS: f64 = 0.001;

/// Maximum magnitude of a duty cycle demand.
pub const MAX_DUTY_PCT: f64 = 100.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Failed to load DriveCtrl parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not create the DriveCtrl archives: {0}")]
    ArchiveInitError(String),

    #[error("Received a non-finite setpoint (forward {0} m/s, turn {1} rad/s)")]
    InvalidSetpoint(f64, f64),
}
