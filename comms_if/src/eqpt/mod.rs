//! # Equipment Interface
//!
//! This module defines the traits through which the mission core drives its equipment. Each
//! piece of equipment is accessed through a narrow, non-blocking interface. Operations which
//! complete asynchronously on the hardware (an interrupt firing, a DMA transfer finishing) are
//! modelled as a `start_*` call followed by a `poll_*` call which consumes the completion.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod drive;
pub mod gpr;
pub mod gps;
pub mod imu;
pub mod monitor;
pub mod radio;

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Errors which can be raised by equipment.
#[derive(Debug, thiserror::Error)]
pub enum EqptError {
    #[error("{0} failed to initialise: {1}")]
    InitFailed(&'static str, String),

    #[error("{0} has not been initialised")]
    NotInitialised(&'static str),

    #[error("Communication with {0} failed: {1}")]
    CommsFailed(&'static str, String),

    #[error("Invalid demand for {0}: {1}")]
    InvalidDemand(&'static str, String),
}
