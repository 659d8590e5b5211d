//! # Trajectory control module
//!
//! Trajectory control moves the rover from its current pose to a target pose. Every move is
//! made of three phases, executed in order:
//!
//! 1. `InitialRotation` - turn on the spot to face the target position
//! 2. `Drive` - drive straight to the target position
//! 3. `FinalRotation` - turn on the spot to the target heading
//!
//! Each phase has a position-domain motion profile (see [`profile`]). While following, the
//! rover's position within the current phase is used to interpolate the velocity setpoint from
//! the profile. Rotation phases are profiled at the wheel edge, so that the rotation respects the
//! same speed and acceleration limits as driving.
//!
//! The follower does not correct the rover's path. If the rover deviates too far from the line
//! (or heading) of the phase it reports itself as off course and takes no further action.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod profile;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::Params;
pub use profile::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrajCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Failed to load TrajCtrl parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not create the TrajCtrl archives: {0}")]
    ArchiveInitError(String),

    #[error("There is no trajectory to follow")]
    NoTrajectory,

    #[error("Cannot plan a trajectory with a non-finite start or end pose")]
    InvalidPose,

    #[error("Invalid speed multiplier {0}")]
    InvalidMultiplier(f64),
}
