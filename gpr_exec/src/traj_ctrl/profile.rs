//! # Motion profiles
//!
//! A motion profile describes the velocity of the rover as a function of its position within a
//! phase. Each profile is defined by 4 breakpoints which are linearly interpolated:
//!
//! ```text
//!  v ^      ______                 ^
//!    |     /      \               /\
//!    |    /        \             /  \
//!    +---+----------+-->       -+----+-->
//!        0          d  x        0    d  x
//!        trapezoidal            triangular
//! ```
//!
//! Distances shorter than the boundary distance `v_max^2 / a_max` cannot reach the cruise speed
//! and use a triangular profile.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use util::maths::lin_map;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of breakpoints in a profile.
pub const NUM_SEGMENTS: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A breakpoint of a motion profile.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct MotionSegment {
    /// Velocity at this breakpoint.
    pub velocity: f64,

    /// Position of this breakpoint relative to the start of the phase.
    pub position: f64,
}

/// A complete profile.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub shape: ProfileShape,
    pub segments: [MotionSegment; NUM_SEGMENTS],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ProfileShape {
    Triangular,
    Trapezoidal,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Profile {
    /// Calculate the profile to travel `distance` (signed).
    ///
    /// # Inputs
    /// - `distance`: Signed distance to travel
    /// - `max_speed`: Cruise speed, must be non-negative
    /// - `max_accel`: Acceleration limit, must be positive
    pub fn new(distance: f64, max_speed: f64, max_accel: f64) -> Self {
        let sign = if distance < 0.0 { -1.0 } else { 1.0 };
        let boundary = max_speed.powi(2) / max_accel;

        let seg = |velocity: f64, position: f64| MotionSegment { velocity, position };

        if distance.abs() < boundary {
            let peak = (distance.abs() * max_accel).sqrt();
            Self {
                shape: ProfileShape::Triangular,
                segments: [
                    seg(0.0, 0.0),
                    seg(sign * peak, distance / 2.0),
                    seg(sign * peak, distance / 2.0),
                    seg(0.0, distance),
                ],
            }
        }
        else {
            Self {
                shape: ProfileShape::Trapezoidal,
                segments: [
                    seg(0.0, 0.0),
                    seg(sign * max_speed, sign * boundary / 2.0),
                    seg(sign * max_speed, distance - sign * boundary / 2.0),
                    seg(0.0, distance),
                ],
            }
        }
    }

    /// Scale every breakpoint (velocity and position) by a constant factor.
    pub fn scaled(mut self, factor: f64) -> Self {
        for s in self.segments.iter_mut() {
            s.velocity *= factor;
            s.position *= factor;
        }
        self
    }

    /// Total signed distance of the profile.
    pub fn distance(&self) -> f64 {
        self.segments[NUM_SEGMENTS - 1].position
    }

    /// The largest velocity magnitude in the profile.
    pub fn peak_velocity(&self) -> f64 {
        self.segments
            .iter()
            .fold(0f64, |acc, s| acc.max(s.velocity.abs()))
    }

    /// Interpolate the velocity at the given position.
    ///
    /// The ends of the profile are extended by `slack`, within which the velocity of the end
    /// breakpoint is used. Segments of zero length are skipped. Returns `None` if the position
    /// cannot be bracketed.
    pub fn velocity_at(&self, position: f64, slack: f64) -> Option<f64> {
        let first = self.segments[0];
        let last = self.segments[NUM_SEGMENTS - 1];
        let (lo, hi) = if last.position >= first.position {
            (first.position, last.position)
        }
        else {
            (last.position, first.position)
        };

        if position < lo - slack || position > hi + slack {
            return None;
        }

        for pair in self.segments.windows(2) {
            let (a, b) = (pair[0], pair[1]);

            if a.position == b.position {
                continue;
            }

            let (seg_lo, seg_hi) = if a.position < b.position {
                (a.position, b.position)
            }
            else {
                (b.position, a.position)
            };

            if position >= seg_lo && position <= seg_hi {
                return Some(lin_map(
                    (a.position, b.position),
                    (a.velocity, b.velocity),
                    position,
                ));
            }
        }

        // In the slack beyond one end, or a zero length profile
        if (position - first.position).abs() <= (position - last.position).abs() {
            Some(first.velocity)
        }
        else {
            Some(last.velocity)
        }
    }
}
