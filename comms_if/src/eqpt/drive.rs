//! # Drive equipment
//!
//! Motor drivers and wheel encoders of the differential drive.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of counts held by the low part of the encoder counter before it wraps into the high
/// part.
pub const ENCODER_LOW_WRAP: i64 = 65536;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Side of the rover.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Raw reading of a wheel encoder.
///
/// The hardware counter is 16 bits wide, overflows of the counter are accumulated into `high`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderTicks {
    /// Number of wraps of the low counter (signed, decrements on underflow)
    pub high: i32,

    /// Current value of the low counter
    pub low: u16,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A pair of motor drivers, one per side of the rover.
pub trait DriveActuator {
    /// Bring up the motor drivers.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Set the duty cycle of one side.
    ///
    /// `pct` is in the range [-100, 100], positive driving the rover forwards. The driver brakes
    /// the motor when the sign of the demand reverses.
    fn set_percentage(&mut self, side: Side, pct: f64) -> Result<(), EqptError>;
}

/// A single wheel encoder.
pub trait WheelOdometry {
    /// Bring up the encoder.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Start counting.
    fn start(&mut self) -> Result<(), EqptError>;

    /// Stop counting, the current count is retained.
    fn stop(&mut self) -> Result<(), EqptError>;

    /// Reset the count to zero.
    fn zero(&mut self) -> Result<(), EqptError>;

    /// Read the current count.
    fn get_ticks(&mut self) -> Result<EncoderTicks, EqptError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EncoderTicks {
    /// Build a reading from a total number of ticks.
    pub fn from_total(total: i64) -> Self {
        Self {
            high: total.div_euclid(ENCODER_LOW_WRAP) as i32,
            low: total.rem_euclid(ENCODER_LOW_WRAP) as u16,
        }
    }

    /// Total number of ticks represented by this reading.
    pub fn total(&self) -> i64 {
        self.high as i64 * ENCODER_LOW_WRAP + self.low as i64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encoder_ticks() {
        let t = EncoderTicks { high: 2, low: 5 };
        assert_eq!(t.total(), 2 * 65536 + 5);

        // Negative counts wrap into the high part
        let n = EncoderTicks::from_total(-1);
        assert_eq!(n, EncoderTicks { high: -1, low: 65535 });
        assert_eq!(n.total(), -1);

        assert_eq!(EncoderTicks::from_total(70000).total(), 70000);
    }
}
