//! # Simulation
//!
//! A simple simulated world in which the mission core can run without hardware. The world holds
//! the true state of the rover and its equipment, and hands out simulated equipment items which
//! implement the [`comms_if::eqpt`] traits against that state.
//!
//! The rover is modelled as an ideal differential drive. Wheel speeds are found by inverting the
//! linear motor model, the GPS reports the true position and the IMU the true yaw.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use chrono::NaiveTime;
use log::{debug, trace};

use comms_if::eqpt::{drive::Side, gps::GpsFix};

use crate::{gpr_mgr::GprEqpt, loc::{LocEqpt, Pose2D}, mission::TickSource};

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod eqpt;
mod params;

pub use eqpt::*;
pub use params::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Approximate length of one degree of latitude.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Maximum number of GPS sentences buffered by the simulated receiver.
const GPS_QUEUE_LEN: usize = 4;

const SECONDS_PER_DAY: u32 = 86_400;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the simulated world.
///
/// Cloning the handle does not clone the world, all clones refer to the same state.
#[derive(Clone)]
pub struct SimWorld {
    inner: Rc<RefCell<World>>,
}

/// Tick source which advances the simulated world by one cycle each cycle.
pub struct SimTickSource {
    world: SimWorld,
    cycle_period_s: f64,
    pacer: Option<crate::mission::StdTickSource>,
}

/// The true state of the simulation.
pub(crate) struct World {
    pub(crate) params: SimParams,

    pub(crate) time_s: f64,

    /// If set all equipment fails to initialise
    pub(crate) fail_init: bool,

    // ---- ROVER ----
    pub(crate) pose: Pose2D,
    pub(crate) wheel_dist_m: [f64; 2],
    pub(crate) duty_pct: [f64; 2],

    // ---- ODOMETRY ----
    pub(crate) odo_zero_m: [f64; 2],
    pub(crate) odo_frozen_m: [Option<f64>; 2],

    // ---- GPS ----
    pub(crate) gps_queue: VecDeque<String>,
    pub(crate) gps_receiving: bool,
    pub(crate) last_gps_s: f64,

    // ---- GPR ----
    pub(crate) gpr_tx_on: bool,
    pub(crate) gpr_ref_on: bool,
    pub(crate) gpr_tx_freq_mhz: f64,
    pub(crate) gpr_ref_freq_mhz: f64,
    pub(crate) gpr_tx_freq_history: Vec<f64>,
    pub(crate) gpr_timer_armed: bool,

    /// Polls remaining and number of samples requested
    pub(crate) gpr_sampling: Option<(usize, usize)>,

    // ---- MONITORING ----
    pub(crate) battery_v: f64,
    pub(crate) battery_read_pending: bool,
    pub(crate) switch_pressed: bool,

    // ---- RADIO ----
    pub(crate) radio_bytes: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimWorld {
    pub fn new(params: SimParams) -> Self {
        let pose = Pose2D::new(
            params.initial_pose[0],
            params.initial_pose[1],
            params.initial_pose[2],
        );

        let world = World {
            time_s: 0.0,
            fail_init: false,
            pose,
            wheel_dist_m: [0.0; 2],
            duty_pct: [0.0; 2],
            odo_zero_m: [0.0; 2],
            odo_frozen_m: [Some(0.0); 2],
            gps_queue: VecDeque::new(),
            gps_receiving: false,
            last_gps_s: 0.0,
            gpr_tx_on: false,
            gpr_ref_on: false,
            gpr_tx_freq_mhz: 0.0,
            gpr_ref_freq_mhz: 0.0,
            gpr_tx_freq_history: Vec::new(),
            gpr_timer_armed: false,
            gpr_sampling: None,
            battery_v: params.battery_initial_v,
            battery_read_pending: false,
            switch_pressed: false,
            radio_bytes: Vec::new(),
            params,
        };

        Self {
            inner: Rc::new(RefCell::new(world)),
        }
    }

    // ---- EQUIPMENT ----

    /// Localisation equipment backed by this world.
    pub fn loc_eqpt(&self) -> LocEqpt {
        LocEqpt {
            left_odo: Box::new(SimOdometer::new(self.clone(), Side::Left)),
            right_odo: Box::new(SimOdometer::new(self.clone(), Side::Right)),
            imu: Box::new(SimImu::new(self.clone())),
            gps: Box::new(SimGps::new(self.clone())),
        }
    }

    /// Radar equipment backed by this world.
    pub fn gpr_eqpt(&self) -> GprEqpt {
        GprEqpt {
            tx: Box::new(SimSignalSource::new(self.clone(), SignalRole::Transmitter)),
            reference: Box::new(SimSignalSource::new(self.clone(), SignalRole::Reference)),
            timer: Box::new(SimPulseTimer::new(self.clone())),
            receiver: Box::new(SimReceiver::new(self.clone())),
        }
    }

    pub fn drive_actuator(&self) -> Box<SimDriveActuator> {
        Box::new(SimDriveActuator::new(self.clone()))
    }

    pub fn radio(&self) -> Box<SimRadio> {
        Box::new(SimRadio::new(self.clone()))
    }

    pub fn battery_monitor(&self) -> Box<SimBatteryMonitor> {
        Box::new(SimBatteryMonitor::new(self.clone()))
    }

    pub fn enable_switch(&self) -> Box<SimEnableSwitch> {
        Box::new(SimEnableSwitch::new(self.clone()))
    }

    // ---- STEPPING ----

    /// Advance the simulation by `dt_s` seconds.
    pub fn step(&self, dt_s: f64) {
        let mut guard = self.inner.borrow_mut();
        let w = &mut *guard;

        let speed = [
            w.duty_to_speed(w.duty_pct[0]),
            w.duty_to_speed(w.duty_pct[1]),
        ];

        w.wheel_dist_m[0] += speed[0] * dt_s;
        w.wheel_dist_m[1] += speed[1] * dt_s;

        let dist_m = 0.5 * (speed[0] + speed[1]) * dt_s;
        let d_theta = (speed[1] - speed[0]) / w.params.wheel_base_m * dt_s;
        let mid_theta = w.pose.theta() + 0.5 * d_theta;

        w.pose.position_m[0] += dist_m * mid_theta.cos();
        w.pose.position_m[1] += dist_m * mid_theta.sin();
        let theta = w.pose.theta() + d_theta;
        w.pose.set_theta(theta);

        w.time_s += dt_s;
        w.battery_v -= w.params.battery_drain_vs * dt_s;

        if w.time_s - w.last_gps_s >= w.params.gps_period_s {
            w.last_gps_s = w.time_s;
            w.push_gps_fix();
        }

        trace!(
            "Sim t = {:.2} s: pose ({:.3}, {:.3}, {:.3})",
            w.time_s,
            w.pose.x(),
            w.pose.y(),
            w.pose.theta()
        );
    }

    // ---- STATE ACCESS ----

    /// Current simulation time.
    pub fn time_ms(&self) -> u64 {
        (self.inner.borrow().time_s * 1000.0).round() as u64
    }

    /// True pose of the rover.
    pub fn true_pose(&self) -> Pose2D {
        self.inner.borrow().pose
    }

    /// Set the distance travelled by each wheel without moving the rover.
    pub fn set_wheel_distances(&self, left_m: f64, right_m: f64) {
        self.inner.borrow_mut().wheel_dist_m = [left_m, right_m];
    }

    /// Set the true yaw of the rover, as reported by the IMU.
    pub fn set_imu_yaw(&self, yaw_rad: f64) {
        self.inner.borrow_mut().pose.set_theta(yaw_rad);
    }

    /// Queue a raw sentence on the GPS receiver.
    pub fn push_gps_sentence(&self, sentence: &str) {
        self.inner.borrow_mut().push_gps_sentence(sentence.to_string());
    }

    /// Queue a GGA sentence for the true position of the rover.
    pub fn push_gps_fix_at_current_pose(&self) {
        self.inner.borrow_mut().push_gps_fix();
    }

    /// Press or release the enable switch.
    pub fn set_switch_pressed(&self, pressed: bool) {
        self.inner.borrow_mut().switch_pressed = pressed;
    }

    /// Make all equipment fail to initialise.
    pub fn set_init_failure(&self, fail: bool) {
        self.inner.borrow_mut().fail_init = fail;
    }

    /// Duty cycle currently demanded on each side, [left, right].
    pub fn duty_pct(&self) -> [f64; 2] {
        self.inner.borrow().duty_pct
    }

    pub fn gpr_tx_on(&self) -> bool {
        self.inner.borrow().gpr_tx_on
    }

    pub fn gpr_ref_on(&self) -> bool {
        self.inner.borrow().gpr_ref_on
    }

    /// Every frequency the transmitter has been tuned to.
    pub fn gpr_tx_freq_history(&self) -> Vec<f64> {
        self.inner.borrow().gpr_tx_freq_history.clone()
    }

    /// Every byte transmitted over the radio.
    pub fn radio_bytes(&self) -> Vec<u8> {
        self.inner.borrow().radio_bytes.clone()
    }

    pub(crate) fn borrow_mut(&self) -> std::cell::RefMut<'_, World> {
        self.inner.borrow_mut()
    }
}

impl World {
    /// Invert the linear motor model.
    fn duty_to_speed(&self, pct: f64) -> f64 {
        let drive = pct.abs() - self.params.motor_static_offset_pct;

        if drive <= 0.0 {
            0.0
        }
        else {
            pct.signum() * drive / self.params.motor_slope_pct_per_ms
        }
    }

    pub(crate) fn push_gps_sentence(&mut self, sentence: String) {
        if self.gps_queue.len() >= GPS_QUEUE_LEN {
            self.gps_queue.pop_front();
        }
        self.gps_queue.push_back(sentence);
    }

    fn push_gps_fix(&mut self) {
        let latitude_deg = self.params.gps_origin_lat_deg + self.pose.y() / METERS_PER_DEG_LAT;
        let longitude_deg = self.params.gps_origin_lon_deg
            + self.pose.x() / (METERS_PER_DEG_LAT * latitude_deg.to_radians().cos());

        let secs = self.time_s.max(0.0);
        let time = match NaiveTime::from_num_seconds_from_midnight_opt(
            secs as u32 % SECONDS_PER_DAY,
            (secs.fract() * 1e9) as u32,
        ) {
            Some(t) => t,
            None => return,
        };

        let fix = GpsFix {
            time,
            latitude_deg,
            longitude_deg,
            quality: 1,
            num_satellites: 9,
            hdop: 0.9,
            altitude_m: self.params.gps_altitude_m,
            geoid_sep_m: 50.0,
        };

        debug!("Sim GPS fix: {}", fix);
        self.push_gps_sentence(fix.to_string());
    }

    /// Distance travelled by a wheel.
    pub(crate) fn wheel_dist(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.wheel_dist_m[0],
            Side::Right => self.wheel_dist_m[1],
        }
    }
}

impl SimTickSource {
    pub fn new(world: SimWorld, cycle_period_s: f64) -> Self {
        let pacer = if world.inner.borrow().params.real_time {
            Some(crate::mission::StdTickSource::new(cycle_period_s))
        }
        else {
            None
        };

        Self {
            world,
            cycle_period_s,
            pacer,
        }
    }

    /// Number of consecutive cycles which have overrun, always zero when not paced.
    pub fn num_consec_overruns(&self) -> u64 {
        self.pacer
            .as_ref()
            .map(|p| p.num_consec_overruns())
            .unwrap_or(0)
    }
}

impl TickSource for SimTickSource {
    fn now_ms(&self) -> u64 {
        self.world.time_ms()
    }

    fn wait_for_next_cycle(&mut self) {
        if let Some(ref mut p) = self.pacer {
            p.wait_for_next_cycle();
        }

        self.world.step(self.cycle_period_s);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_straight_motion() {
        let world = SimWorld::new(SimParams::default_test());

        // 0.1 m/s on both wheels
        world.borrow_mut().duty_pct = [25.0, 25.0];
        for _ in 0..100 {
            world.step(0.01);
        }

        let pose = world.true_pose();
        assert!((pose.x() - 0.1).abs() < 1e-9);
        assert!(pose.y().abs() < 1e-9);
        assert_eq!(world.time_ms(), 1000);
    }

    #[test]
    fn test_static_friction() {
        let world = SimWorld::new(SimParams::default_test());
        world.borrow_mut().duty_pct = [-4.0, 4.0];
        world.step(1.0);
        assert_eq!(world.true_pose(), Pose2D::default());
    }

    #[test]
    fn test_point_turn() {
        let world = SimWorld::new(SimParams::default_test());

        // 0.1 m/s per wheel on a 0.2 m wheel base is 1 rad/s
        world.borrow_mut().duty_pct = [-25.0, 25.0];
        for _ in 0..50 {
            world.step(0.01);
        }

        let pose = world.true_pose();
        assert!(pose.position_m.norm() < 1e-9);
        assert!((pose.theta() - 0.5).abs() < 1e-9);

        for _ in 0..300 {
            world.step(0.01);
        }
        assert!((world.true_pose().theta() - (3.5 - 2.0 * PI)).abs() < 1e-9);
    }

    #[test]
    fn test_periodic_gps() {
        let world = SimWorld::new(SimParams::default_test());
        for _ in 0..250 {
            world.step(0.01);
        }

        let w = world.borrow_mut();
        assert_eq!(w.gps_queue.len(), 2);
        let fix: GpsFix = w.gps_queue[0].parse().unwrap();
        assert!((fix.latitude_deg - 55.9445).abs() < 1e-6);
    }
}
