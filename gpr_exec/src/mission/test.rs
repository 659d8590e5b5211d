//! Scheduler tests, run against the simulation

use std::f64::consts::PI;

use serde::de::DeserializeOwned;

use comms_if::tm::{TmKind, TmMessage};

use super::*;
use crate::{
    area_search::AreaSearchParams,
    drive_ctrl::{self, DriveCtrl},
    gpr_mgr::{GprMgr, GprMgrParams, SweepConfig},
    loc::{LocMgr, LocMgrParams},
    sim::{SimParams, SimTickSource, SimWorld},
    tm_link::{TmLink, TmLinkParams},
    traj_ctrl::{self, TrajCtrl},
};
use util::params::load_from_path;

const CYCLE_PERIOD_S: f64 = 0.01;

fn mission_params() -> MissionParams {
    MissionParams {
        cycle_period_s: CYCLE_PERIOD_S,
        auto_enable: true,
        record_at_lane_start: true,
        speed_multiplier: 1.0,
        pose_tm_period_s: 1.0,
        monitoring_tm_period_s: 5.0,
    }
}

fn setup(params: MissionParams) -> (Scheduler, MissionCtx, SimWorld) {
    let mut sim_params = SimParams::default_test();
    sim_params.ticks_per_m = 10_000.0;
    let world = SimWorld::new(sim_params);

    let loc = LocMgr::new(
        LocMgrParams {
            ticks_per_m: 10_000.0,
            wheel_base_m: 0.2,
            initial_pose: [0.0, 0.0, 0.0],
            use_imu_heading: true,
        },
        world.loc_eqpt(),
    );

    let drive_ctrl = DriveCtrl::new(drive_ctrl::Params {
        wheel_base_m: 0.2,
        max_wheel_speed_ms: 0.5,
        max_head_trim_rads: 0.1,
        wheel_pid_gains: [0.3, 0.0002, 0.0],
        head_pid_gains: [1.5, 0.0005, 0.0],
        motor_slope_pct_per_ms: 200.0,
        motor_static_offset_pct: 5.0,
    });

    let traj_ctrl = TrajCtrl::new(traj_ctrl::Params {
        max_speed_ms: 0.1,
        max_accel_mss: 0.1,
        wheel_base_m: 0.2,
        pos_stopband_m: 0.03,
        ang_stopband_rad: 0.01,
        off_course_factor: 2.0,
        min_speed_ms: 0.01,
        min_turn_rate_rads: 0.05,
    });

    let gpr_mgr = GprMgr::new(
        GprMgrParams {
            sampling_rate_hz: 1333333.33,
            if_nyquist_fraction: 0.9,
            max_steps: 50,
            max_samples_per_step: 1000,
            pulse_width_us: 1,
            sweep: SweepConfig {
                start_freq_mhz: 1000.0,
                stop_freq_mhz: 1100.0,
                num_steps: 3,
                samples_per_step: 16,
            },
        },
        world.gpr_eqpt(),
    );

    let tm_link = TmLink::new(
        TmLinkParams {
            bitrate_bps: 115_200.0,
            queue_capacity_bytes: 1024,
        },
        world.radio(),
    );

    let ctx = MissionCtx::new(
        params,
        AreaSearchParams {
            width_m: 0.5,
            length_m: 0.5,
            num_passes: 2,
            stops_per_pass: 0,
        },
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
        None,
    );

    (Scheduler::new(), ctx, world)
}

/// Load one of the parameter files shipped with the executable.
fn shipped<P: DeserializeOwned>(name: &str) -> P {
    let path = format!("{}/../params/{}", env!("CARGO_MANIFEST_DIR"), name);
    match load_from_path(&path) {
        Ok(p) => p,
        Err(e) => panic!("Could not load {}: {}", name, e),
    }
}

/// Build the mission exactly as the executable does, but without pacing to the wall clock.
fn setup_shipped() -> (Scheduler, MissionCtx, SimWorld) {
    let mut sim_params: SimParams = shipped("sim.toml");
    sim_params.real_time = false;
    let world = SimWorld::new(sim_params);

    let ctx = MissionCtx::new(
        shipped("mission.toml"),
        shipped("area_search.toml"),
        MissionModules {
            loc: LocMgr::new(shipped("loc.toml"), world.loc_eqpt()),
            drive_ctrl: DriveCtrl::new(shipped("drive_ctrl.toml")),
            traj_ctrl: TrajCtrl::new(shipped("traj_ctrl.toml")),
            gpr_mgr: GprMgr::new(shipped("gpr_mgr.toml"), world.gpr_eqpt()),
            tm_link: TmLink::new(shipped("tm_link.toml"), world.radio()),
        },
        MissionEqpt {
            drive: world.drive_actuator(),
            battery: world.battery_monitor(),
            switch: world.enable_switch(),
        },
        None,
    );

    (Scheduler::new(), ctx, world)
}

/// Tick until `done` returns true, panicking if it takes more than `max_ticks`.
fn run_until<F>(
    sched: &mut Scheduler,
    ctx: &mut MissionCtx,
    ticks: &mut SimTickSource,
    max_ticks: usize,
    mut done: F,
) where
    F: FnMut(&Scheduler, &MissionCtx) -> bool,
{
    for _ in 0..max_ticks {
        if done(sched, ctx) {
            return;
        }
        sched.tick(ctx, ticks.now_ms()).unwrap();
        ticks.wait_for_next_cycle();
    }

    panic!(
        "Condition not reached after {} ticks, state {:?}",
        max_ticks,
        sched.state_id()
    );
}

fn count_messages(bytes: &[u8]) -> [usize; 4] {
    let mut counts = [0; 4];
    let mut offset = 0;

    while offset < bytes.len() {
        let (msg, len) = TmMessage::decode(&bytes[offset..]).unwrap();
        counts[msg.kind() as usize - 1] += 1;
        offset += len;
    }

    counts
}

#[test]
fn test_transition_table() {
    use EndStatus::*;

    assert_eq!(
        next_state(StateId::Initialize, InitializationComplete),
        Some(StateId::Disabled)
    );
    assert_eq!(next_state(StateId::Disabled, SystemEnabled), Some(StateId::Drive));
    assert_eq!(next_state(StateId::Drive, TrajectoryComplete), Some(StateId::Record));
    assert_eq!(next_state(StateId::Drive, SystemDisabled), Some(StateId::Disabled));
    assert_eq!(next_state(StateId::Record, RecordingComplete), Some(StateId::Drive));
    assert_eq!(next_state(StateId::Record, SystemDisabled), Some(StateId::Disabled));

    for id in [
        StateId::Initialize,
        StateId::Disabled,
        StateId::Drive,
        StateId::Record,
    ]
    .iter()
    {
        assert_eq!(next_state(*id, NoChange), Some(*id));
    }

    // Unmatched pairs have no transition
    assert_eq!(next_state(StateId::Disabled, TrajectoryComplete), None);
    assert_eq!(next_state(StateId::Record, SystemEnabled), None);
    assert_eq!(next_state(StateId::Initialize, SystemDisabled), None);
}

#[test]
fn test_full_mission() {
    let (mut sched, mut ctx, world) = setup(mission_params());
    let mut ticks = SimTickSource::new(world.clone(), CYCLE_PERIOD_S);

    assert_eq!(sched.state_id(), StateId::Initialize);

    // Initialisation is one-shot
    let status = sched.tick(&mut ctx, ticks.now_ms()).unwrap();
    assert_eq!(status, EndStatus::InitializationComplete);
    assert_eq!(sched.next_state_id(), StateId::Disabled);
    assert_eq!(ctx.area.as_ref().unwrap().num_destinations(), 4);
    ticks.wait_for_next_cycle();

    let mut states_seen = Vec::new();
    run_until(&mut sched, &mut ctx, &mut ticks, 20_000, |s, c| {
        if states_seen.last() != Some(&s.state_id()) {
            states_seen.push(s.state_id());
        }
        s.state_id() == StateId::Disabled
            && c.area.as_ref().map(|a| a.is_complete()).unwrap_or(false)
            && c.downlink.is_idle()
    });

    assert_eq!(ctx.num_sweeps, 4);
    assert_eq!(ctx.downlink.num_sent(), 4);
    assert_eq!(
        &states_seen[..5],
        &[
            StateId::Initialize,
            StateId::Disabled,
            StateId::Drive,
            StateId::Record,
            StateId::Drive
        ]
    );

    // Ends on the last destination, the start of the second pass run backwards
    let pose = world.true_pose();
    assert!(pose.x().abs() < 0.05);
    assert!((pose.y() - 0.5).abs() < 0.05);
    assert!((pose.theta().abs() - PI).abs() < 0.05);

    // Motors are inert
    assert_eq!(world.duty_pct(), [0.0, 0.0]);

    // Three radar steps per sweep, and the housekeeping telemetry
    let counts = count_messages(&world.radio_bytes());
    assert_eq!(counts[TmKind::Radar as usize - 1], 12);
    assert!(counts[TmKind::RelativePose as usize - 1] > 10);
    assert_eq!(counts[TmKind::AbsolutePose as usize - 1], 1);
    assert!(counts[TmKind::Monitoring as usize - 1] > 1);
    assert!((ctx.battery_v().unwrap() - 12.6).abs() < 0.01);

    // Stays disabled
    for _ in 0..100 {
        sched.tick(&mut ctx, ticks.now_ms()).unwrap();
        ticks.wait_for_next_cycle();
    }
    assert_eq!(sched.state_id(), StateId::Disabled);
}

#[test]
fn test_shipped_mission() {
    let (mut sched, mut ctx, world) = setup_shipped();
    let mut ticks = SimTickSource::new(world.clone(), ctx.params.cycle_period_s);
    let sweep = ctx.gpr_mgr.params().sweep;

    // Starts without anyone touching the switch
    run_until(&mut sched, &mut ctx, &mut ticks, 60_000, |s, c| {
        s.state_id() == StateId::Disabled
            && c.area.as_ref().map(|a| a.is_complete()).unwrap_or(false)
            && c.downlink.is_idle()
    });

    let area = ctx.area.as_ref().unwrap();
    let num_dests = area.num_destinations();
    assert_eq!(num_dests, 21);
    assert_eq!(ctx.num_sweeps, num_dests);
    assert_eq!(ctx.downlink.num_sent(), num_dests);

    // Stayed on course all the way to the far corner of the area
    let last = area.destination(num_dests - 1).unwrap().pose;
    let pose = world.true_pose();
    assert!((pose.x() - last.x()).abs() < 0.05);
    assert!((pose.y() - last.y()).abs() < 0.05);
    assert!(pose.theta().abs() < 0.05);
    assert_eq!(world.duty_pct(), [0.0, 0.0]);

    // Every frame on the wire decodes, with one radar message per step of every sweep
    let counts = count_messages(&world.radio_bytes());
    assert_eq!(counts[TmKind::Radar as usize - 1], num_dests * sweep.num_steps);
    assert_eq!(counts[TmKind::AbsolutePose as usize - 1], 1);
    assert!(counts[TmKind::RelativePose as usize - 1] > 10);
    assert!(counts[TmKind::Monitoring as usize - 1] >= 1);
}

#[test]
fn test_no_recording_at_lane_start() {
    let mut params = mission_params();
    params.record_at_lane_start = false;
    let (mut sched, mut ctx, world) = setup(params);
    let mut ticks = SimTickSource::new(world.clone(), CYCLE_PERIOD_S);

    run_until(&mut sched, &mut ctx, &mut ticks, 20_000, |s, c| {
        s.state_id() == StateId::Disabled
            && c.area.as_ref().map(|a| a.is_complete()).unwrap_or(false)
    });

    assert_eq!(ctx.num_sweeps, 2);
}

#[test]
fn test_operator_enable_and_stop() {
    let mut params = mission_params();
    params.auto_enable = false;
    let (mut sched, mut ctx, world) = setup(params);
    let mut ticks = SimTickSource::new(world.clone(), CYCLE_PERIOD_S);

    // Waits for the switch
    run_until(&mut sched, &mut ctx, &mut ticks, 200, |s, _| s.num_ticks() == 100);
    assert_eq!(sched.state_id(), StateId::Disabled);

    world.set_switch_pressed(true);
    run_until(&mut sched, &mut ctx, &mut ticks, 10, |s, _| {
        s.state_id() == StateId::Drive
    });

    // Holding the switch is not a second press
    for _ in 0..50 {
        sched.tick(&mut ctx, ticks.now_ms()).unwrap();
        ticks.wait_for_next_cycle();
    }
    assert_ne!(sched.state_id(), StateId::Disabled);

    // Let the rover get under way to the second destination
    world.set_switch_pressed(false);
    run_until(&mut sched, &mut ctx, &mut ticks, 5_000, |_, c| {
        c.area.as_ref().map(|a| a.destinations_reached()).unwrap_or(0) == 2
            && world.duty_pct() != [0.0, 0.0]
    });

    // Second press stops it
    world.set_switch_pressed(true);
    run_until(&mut sched, &mut ctx, &mut ticks, 10, |s, _| {
        s.state_id() == StateId::Disabled
    });
    assert_eq!(world.duty_pct(), [0.0, 0.0]);
    assert!(ctx.traj_ctrl.trajectory().is_none());
}

#[test]
fn test_init_failure() {
    let (mut sched, mut ctx, world) = setup(mission_params());
    world.set_init_failure(true);

    assert!(matches!(
        sched.tick(&mut ctx, 0),
        Err(MissionError::InitFailed(_))
    ));
}
