//! # GPR survey rover library.
//!
//! The mission core of the rover. The executable in this crate runs it against simulated
//! equipment, a rover build provides the real equipment through the `comms_if::eqpt` traits.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Area search - lays out the boustrophedon pattern of stops covering the survey area
pub mod area_search;

/// Drive control - converts velocity setpoints into motor duty cycles
pub mod drive_ctrl;

/// GPR manager - sequences stepped-frequency radar sweeps
pub mod gpr_mgr;

/// Localisation - polls the sensors and estimates the rover's pose
pub mod loc;

/// Mission - the state machine running the survey
pub mod mission;

/// Simulation - simulated world and equipment
pub mod sim;

/// Telemetry link - flow-controlled telemetry over the radio
pub mod tm_link;

/// Trajectory control - plans point-to-point moves and keeps the rover on them
pub mod traj_ctrl;

#[cfg(test)]
mod test {
    use serde::de::DeserializeOwned;
    use util::params::load_from_path;

    use crate::{
        area_search::AreaSearchParams, drive_ctrl, gpr_mgr::GprMgrParams, loc::LocMgrParams,
        mission::MissionParams, sim::SimParams, tm_link::TmLinkParams, traj_ctrl,
    };

    fn load<P: DeserializeOwned>(name: &str) -> P {
        let path = format!("{}/../params/{}", env!("CARGO_MANIFEST_DIR"), name);
        match load_from_path(&path) {
            Ok(p) => p,
            Err(e) => panic!("Could not load {}: {}", name, e),
        }
    }

    /// Every parameter file shipped with the executable must parse and agree on the rover's
    /// geometry.
    #[test]
    fn test_param_files() {
        let mission: MissionParams = load("mission.toml");
        let sim: SimParams = load("sim.toml");
        let drive: drive_ctrl::Params = load("drive_ctrl.toml");
        let traj: traj_ctrl::Params = load("traj_ctrl.toml");
        let area: AreaSearchParams = load("area_search.toml");
        let gpr: GprMgrParams = load("gpr_mgr.toml");
        let tm: TmLinkParams = load("tm_link.toml");
        let loc: LocMgrParams = load("loc.toml");

        assert!(mission.cycle_period_s > 0.0);
        assert!(mission.auto_enable, "nothing presses the switch in simulation");

        // One cycle of measurement lag, so anything above 1 oscillates
        assert!(drive.wheel_pid_gains[0] < 1.0);

        assert_eq!(sim.wheel_base_m, drive.wheel_base_m);
        assert_eq!(sim.wheel_base_m, traj.wheel_base_m);
        assert_eq!(sim.wheel_base_m, loc.wheel_base_m);
        assert_eq!(sim.ticks_per_m, loc.ticks_per_m);
        assert_eq!(sim.motor_slope_pct_per_ms, drive.motor_slope_pct_per_ms);
        assert_eq!(sim.motor_static_offset_pct, drive.motor_static_offset_pct);

        assert!(area.num_passes >= 1);
        assert!(gpr.sweep.num_steps <= gpr.max_steps);
        assert!(gpr.sweep.samples_per_step <= gpr.max_samples_per_step);
        assert!(tm.bitrate_bps > 0.0);
    }
}
