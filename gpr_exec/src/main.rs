//! Main GPR survey rover executable entry point.
//!
//! # Architecture
//!
//! The executable runs the mission core against the simulation:
//!
//!     - Initialise the session and logging
//!     - Load the parameters of every module
//!     - Create the simulated world and its equipment
//!     - Run the mission scheduler, one cycle per period
//!
//! An optional single argument gives the run duration in seconds, otherwise the mission runs
//! until the process is killed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info};
use std::env;

// Internal
use gpr_lib::{
    area_search::AreaSearchParams,
    drive_ctrl::DriveCtrl,
    gpr_mgr::GprMgr,
    loc::LocMgr,
    mission::{MissionCtx, MissionEqpt, MissionModules, MissionParams, Scheduler, TickSource},
    sim::{SimParams, SimTickSource, SimWorld},
    tm_link::TmLink,
    traj_ctrl::TrajCtrl,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    raise_error,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive overruns after which the timing of the loop can no longer be trusted.
const MAX_CONSEC_OVERRUNS: u64 = 500;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("gpr_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("GPR Survey Rover Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- ARGUMENTS ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let max_duration_ms = match args.len() {
        1 => None,
        2 => {
            let secs: f64 = args[1]
                .parse()
                .wrap_err_with(|| format!("Invalid run duration \"{}\"", args[1]))?;
            info!("Running for {} s", secs);
            Some((secs * 1000.0) as u64)
        }
        n => {
            return Err(eyre!(
                "Expected zero or one argument (run duration in seconds), found {}",
                n - 1
            ))
        }
    };

    // ---- LOAD PARAMETERS ----

    let mission_params: MissionParams =
        util::params::load("mission.toml").wrap_err("Could not load mission params")?;
    let area_params =
        AreaSearchParams::load("area_search.toml").wrap_err("Could not load area search params")?;
    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE SIMULATION ----

    let world = SimWorld::new(sim_params);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut drive_ctrl = DriveCtrl::default();
    drive_ctrl
        .init("drive_ctrl.toml", &session)
        .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    let mut traj_ctrl = TrajCtrl::default();
    traj_ctrl
        .init("traj_ctrl.toml", &session)
        .wrap_err("Failed to initialise TrajCtrl")?;
    info!("TrajCtrl init complete");

    let loc = LocMgr::from_params_file("loc.toml", world.loc_eqpt())
        .wrap_err("Failed to create LocMgr")?;
    let gpr_mgr = GprMgr::from_params_file("gpr_mgr.toml", world.gpr_eqpt())
        .wrap_err("Failed to create GprMgr")?;
    let tm_link = TmLink::from_params_file("tm_link.toml", world.radio())
        .wrap_err("Failed to create TmLink")?;

    info!("Module initialisation complete\n");

    let mut ticks = SimTickSource::new(world.clone(), mission_params.cycle_period_s);

    let mut ctx = MissionCtx::new(
        mission_params,
        area_params,
        MissionModules {
            loc,
            drive_ctrl,
            traj_ctrl,
            gpr_mgr,
            tm_link,
        },
        MissionEqpt {
            drive: world.drive_actuator(),
            battery: world.battery_monitor(),
            switch: world.enable_switch(),
        },
        Some(session),
    );

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut scheduler = Scheduler::new();

    loop {
        let time_ms = ticks.now_ms();

        if let Some(max) = max_duration_ms {
            if time_ms >= max {
                info!("Run duration of {} ms reached", max);
                break;
            }
        }

        scheduler
            .tick(&mut ctx, time_ms)
            .wrap_err("Mission failed")?;

        ticks.wait_for_next_cycle();

        if ticks.num_consec_overruns() > MAX_CONSEC_OVERRUNS {
            raise_error!(
                "More than {} consecutive cycle overruns",
                MAX_CONSEC_OVERRUNS
            );
        }
    }

    // ---- SHUTDOWN ----

    info!(
        "Mission ended after {} cycles with {} sweeps recorded, {} sent",
        scheduler.num_ticks(),
        ctx.num_sweeps,
        ctx.downlink.num_sent()
    );

    if let Some(s) = ctx.session.take() {
        s.exit();
    }

    Ok(())
}
