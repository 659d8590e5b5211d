//! Area search parameters

use serde::Deserialize;

/// Dimensions of the area to survey.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaSearchParams {
    /// Extent of the area across the passes (the rover's left at the start).
    ///
    /// Units: meters
    pub width_m: f64,

    /// Extent of the area along each pass (the rover's forward at the start).
    ///
    /// Units: meters
    pub length_m: f64,

    /// Number of passes (lanes) across the width.
    pub num_passes: usize,

    /// Number of stops along each pass, in addition to the stops at each
    /// end of the pass.
    pub stops_per_pass: usize,
}
