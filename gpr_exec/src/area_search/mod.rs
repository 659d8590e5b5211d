//! # Area search module
//!
//! Generates the sequence of destinations which cover a rectangular area in a boustrophedon
//! ("lawnmower") pattern. The area is defined in the frame of the rover's starting pose: passes
//! run along the rover's forward axis and are stacked towards its left.
//!
//! ```text
//!  y ^
//!    |  o <-- o <-- o <-- o     pass 1, heading reversed
//!    |
//!    |  o --> o --> o --> o     pass 0
//!    +-------------------------> x
//! ```
//!
//! Each pass has `stops_per_pass + 2` evenly spaced stops, including both ends.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

pub use params::AreaSearchParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use nalgebra::Vector2;
use serde::Serialize;
use std::f64::consts::PI;

use crate::loc::Pose2D;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A search area and the progress through it.
#[derive(Debug, Clone)]
pub struct SearchArea {
    params: AreaSearchParams,

    /// Pose of the rover when the area was generated
    origin: Pose2D,

    /// Number of destinations already handed out
    reached: usize,
}

/// A destination in the search pattern.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Destination {
    /// Index of the destination in the pattern
    pub index: usize,

    /// Target pose in the world frame
    pub pose: Pose2D,

    /// True if this destination is the first stop of a pass
    pub line_complete: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AreaSearchError {
    #[error("Failed to load area search parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("The search area must have at least one pass")]
    NoPasses,

    #[error("Invalid search area dimensions {0} x {1} m")]
    InvalidDimensions(f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AreaSearchParams {
    /// Load the parameters from the given file.
    pub fn load(params_path: &str) -> Result<Self, AreaSearchError> {
        util::params::load(params_path).map_err(AreaSearchError::ParamLoadError)
    }
}

impl SearchArea {
    /// Generate a search area starting at the given pose.
    pub fn generate_area(params: &AreaSearchParams, origin: Pose2D) -> Result<Self, AreaSearchError> {
        if params.num_passes == 0 {
            return Err(AreaSearchError::NoPasses);
        }

        let dims_ok = |d: f64| d.is_finite() && d >= 0.0;
        if !dims_ok(params.width_m) || !dims_ok(params.length_m) {
            return Err(AreaSearchError::InvalidDimensions(params.width_m, params.length_m));
        }

        let area = Self {
            params: params.clone(),
            origin,
            reached: 0,
        };

        info!(
            "Search area generated: {} x {} m, {} passes of {} stops ({} destinations)",
            params.width_m,
            params.length_m,
            params.num_passes,
            params.stops_per_pass + 2,
            area.num_destinations()
        );

        Ok(area)
    }

    /// Total number of destinations in the pattern.
    pub fn num_destinations(&self) -> usize {
        self.stops_per_line() * self.params.num_passes
    }

    /// Number of destinations already retrieved.
    pub fn destinations_reached(&self) -> usize {
        self.reached
    }

    /// True once every destination has been retrieved.
    pub fn is_complete(&self) -> bool {
        self.reached >= self.num_destinations()
    }

    /// Get the destination with the given index, without advancing through the pattern.
    pub fn destination(&self, index: usize) -> Option<Destination> {
        if index >= self.num_destinations() {
            return None;
        }

        let stops = self.stops_per_line();
        let pass = index / stops;
        let mut stop = index % stops;

        // Odd passes run backwards
        let reversed = pass % 2 == 1;
        if reversed {
            stop = (stops - 1) - stop;
        }

        let y = if self.params.num_passes > 1 {
            pass as f64 * self.params.width_m / (self.params.num_passes - 1) as f64
        }
        else {
            0.0
        };
        let x = stop as f64 * self.params.length_m / (stops - 1) as f64;

        let position = self.origin.transform_point(&Vector2::new(x, y));
        let theta = if reversed {
            self.origin.theta() + PI
        }
        else {
            self.origin.theta()
        };

        Some(Destination {
            index,
            pose: Pose2D::from_parts(position, theta),
            line_complete: index % stops == 0,
        })
    }

    /// Get the next destination in the pattern and advance past it.
    ///
    /// Returns `None` once the pattern is complete.
    pub fn retrieve_next_destination(&mut self) -> Option<Destination> {
        let dest = self.destination(self.reached)?;
        self.reached += 1;
        Some(dest)
    }

    fn stops_per_line(&self) -> usize {
        self.params.stops_per_pass + 2
    }
}
