//! # Communications interface crate.
//!
//! Provides all interfaces which cross the boundary of the mission core:
//! the telemetry wire format sent over the radio link, and the traits through
//! which the core talks to its equipment.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telemetry message definitions and wire encoding
pub mod tm;

/// Equipment interface traits and their data types
pub mod eqpt;
