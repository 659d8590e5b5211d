//! Simulation parameters

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {

    // ---- ROVER ----

    /// Distance between the left and right wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// Encoder ticks per meter of wheel travel
    pub ticks_per_m: f64,

    /// Duty cycle per unit of wheel speed.
    ///
    /// Units: percent/(meters/second)
    pub motor_slope_pct_per_ms: f64,

    /// Duty cycle below which the wheels do not turn.
    ///
    /// Units: percent
    pub motor_static_offset_pct: f64,

    /// True pose of the rover at the start of the simulation, [x, y, theta].
    pub initial_pose: [f64; 3],

    // ---- GPS ----

    /// Period between GPS sentences.
    ///
    /// Units: seconds
    pub gps_period_s: f64,

    /// Latitude of the simulation origin.
    pub gps_origin_lat_deg: f64,

    /// Longitude of the simulation origin.
    pub gps_origin_lon_deg: f64,

    /// Altitude of the simulated terrain.
    ///
    /// Units: meters
    pub gps_altitude_m: f64,

    // ---- GPR ----

    /// Number of receiver polls before a sampling run completes
    pub gpr_sampling_polls: usize,

    // ---- MONITORING ----

    /// Battery voltage at the start of the simulation.
    ///
    /// Units: volts
    pub battery_initial_v: f64,

    /// Units: volts/second
    pub battery_drain_vs: f64,

    // ---- EXECUTION ----

    /// If true the simulation runs in real time, otherwise as fast as possible.
    pub real_time: bool,
}

impl SimParams {
    /// Parameters used by unit tests.
    pub fn default_test() -> Self {
        Self {
            wheel_base_m: 0.2,
            ticks_per_m: 1000.0,
            motor_slope_pct_per_ms: 200.0,
            motor_static_offset_pct: 5.0,
            initial_pose: [0.0, 0.0, 0.0],
            gps_period_s: 1.0,
            gps_origin_lat_deg: 55.9445,
            gps_origin_lon_deg: -3.1892,
            gps_altitude_m: 80.0,
            gpr_sampling_polls: 2,
            battery_initial_v: 12.6,
            battery_drain_vs: 0.0,
            real_time: false,
        }
    }
}
