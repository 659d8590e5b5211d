//! # GPR manager module
//!
//! Sequences a stepped-frequency radar sweep. For each step of the sweep:
//!
//! 1. The transmitter is tuned to the step frequency and the reference source to the step
//!    frequency minus the target intermediate frequency (IF).
//! 2. The reference source and the receiver are started, then the transmitter is started and the
//!    pulse timer armed. When the timer elapses the transmitter is stopped.
//! 3. Once the receiver has captured its samples the reference source is stopped, the samples and
//!    frequencies are stored, and the next step begins.
//!
//! The IF is placed just below the Nyquist frequency of the receiver.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

pub use params::*;
pub use state::*;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GprMgrError {
    #[error("Failed to load GprMgr parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not create the GprMgr archives: {0}")]
    ArchiveInitError(String),

    #[error("A sweep is already being recorded")]
    AlreadyRecording,

    #[error("Invalid number of steps {0}, must be between 1 and {1}")]
    InvalidNumSteps(usize, usize),

    #[error("Invalid number of samples per step {0}, must be between 1 and {1}")]
    InvalidNumSamples(usize, usize),

    #[error("Invalid sweep range {0} MHz to {1} MHz")]
    InvalidRange(f64, f64),

    #[error("Equipment error: {0}")]
    EqptError(#[from] comms_if::eqpt::EqptError),
}
