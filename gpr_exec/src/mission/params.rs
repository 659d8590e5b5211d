//! Mission parameters

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MissionParams {
    /// Period of the mission cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// If true the rover enables itself once initialisation is complete, without waiting for
    /// the enable switch.
    pub auto_enable: bool,

    /// If false no recording is made at the first stop of each pass.
    pub record_at_lane_start: bool,

    /// Multiplier applied to the maximum trajectory speed, [0, 1].
    pub speed_multiplier: f64,

    /// Period between relative pose telemetry messages.
    ///
    /// Units: seconds
    pub pose_tm_period_s: f64,

    /// Period between monitoring telemetry messages.
    ///
    /// Units: seconds
    pub monitoring_tm_period_s: f64,
}
