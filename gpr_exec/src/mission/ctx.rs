//! Mission context and per-cycle housekeeping

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};

use comms_if::{
    eqpt::{
        drive::{DriveActuator, Side},
        monitor::{BatteryMonitor, EnableSwitch},
        EqptError,
    },
    tm::PoseTm,
};
use util::session::Session;

use super::{MissionParams, SweepDownlink};
use crate::{
    area_search::{AreaSearchParams, SearchArea},
    drive_ctrl::{DriveCtrl, OutputData},
    gpr_mgr::GprMgr,
    loc::{Estimate, LocMgr},
    tm_link::TmLink,
    traj_ctrl::TrajCtrl,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The processing modules run by the mission.
pub struct MissionModules {
    pub loc: LocMgr,
    pub drive_ctrl: DriveCtrl,
    pub traj_ctrl: TrajCtrl,
    pub gpr_mgr: GprMgr,
    pub tm_link: TmLink,
}

/// Equipment used directly by the mission.
pub struct MissionEqpt {
    pub drive: Box<dyn DriveActuator>,
    pub battery: Box<dyn BatteryMonitor>,
    pub switch: Box<dyn EnableSwitch>,
}

/// Everything the mission states operate on.
pub struct MissionCtx {
    pub params: MissionParams,
    pub area_params: AreaSearchParams,

    pub loc: LocMgr,
    pub drive_ctrl: DriveCtrl,
    pub traj_ctrl: TrajCtrl,
    pub gpr_mgr: GprMgr,
    pub tm_link: TmLink,

    pub eqpt: MissionEqpt,

    /// The session, if archives and recorded data are to be saved
    pub session: Option<Session>,

    /// The search area, generated during initialisation
    pub area: Option<SearchArea>,

    pub downlink: SweepDownlink,

    /// Estimate updated at the start of this cycle
    pub estimate: Estimate,

    /// Time of the current cycle
    pub time_ms: u64,

    /// Number of sweeps recorded
    pub num_sweeps: usize,

    /// Set once auto enable has been used, so the rover does not re-enable itself after a stop
    pub(crate) auto_enable_used: bool,

    /// True if the switch went from released to pressed this cycle
    switch_pressed_edge: bool,
    switch_last_pressed: bool,

    abs_pose_pending: bool,
    last_pose_tm_ms: Option<u64>,
    last_monitoring_tm_ms: Option<u64>,
    battery_read_pending: bool,
    last_battery_v: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MissionCtx {
    pub fn new(
        params: MissionParams,
        area_params: AreaSearchParams,
        modules: MissionModules,
        eqpt: MissionEqpt,
        session: Option<Session>,
    ) -> Self {
        let estimate = modules.loc.estimate();

        Self {
            params,
            area_params,
            loc: modules.loc,
            drive_ctrl: modules.drive_ctrl,
            traj_ctrl: modules.traj_ctrl,
            gpr_mgr: modules.gpr_mgr,
            tm_link: modules.tm_link,
            eqpt,
            session,
            area: None,
            downlink: SweepDownlink::default(),
            estimate,
            time_ms: 0,
            num_sweeps: 0,
            auto_enable_used: false,
            switch_pressed_edge: false,
            switch_last_pressed: false,
            abs_pose_pending: true,
            last_pose_tm_ms: None,
            last_monitoring_tm_ms: None,
            battery_read_pending: false,
            last_battery_v: None,
        }
    }

    /// True if the enable switch was pressed this cycle.
    ///
    /// Holding the switch down only counts as one press.
    pub fn switch_pressed(&self) -> bool {
        self.switch_pressed_edge
    }

    /// The last battery voltage read.
    pub fn battery_v(&self) -> Option<f64> {
        self.last_battery_v
    }

    /// Send a duty cycle demand to the motors.
    pub fn apply_duty(&mut self, duty: &OutputData) -> Result<(), EqptError> {
        self.eqpt.drive.set_percentage(Side::Left, duty.left_pct)?;
        self.eqpt.drive.set_percentage(Side::Right, duty.right_pct)
    }

    /// Stop the drive controller and zero the motors.
    pub fn stop_motors(&mut self) -> Result<(), EqptError> {
        let zero = self.drive_ctrl.stop();
        self.apply_duty(&zero)
    }

    /// Start of cycle processing, run before the state is stepped.
    pub(crate) fn cycle_start(&mut self, time_ms: u64, initialised: bool) {
        self.time_ms = time_ms;

        let pressed = self.eqpt.switch.is_pressed();
        self.switch_pressed_edge = pressed && !self.switch_last_pressed;
        self.switch_last_pressed = pressed;

        if initialised {
            self.estimate = self.loc.update_estimates(time_ms);
        }
    }

    /// Telemetry housekeeping, run after the state is stepped.
    pub(crate) fn housekeeping(&mut self) {
        let time_ms = self.time_ms;

        // ---- POSE ----

        if period_elapsed(self.last_pose_tm_ms, time_ms, self.params.pose_tm_period_s) {
            self.last_pose_tm_ms = Some(time_ms);

            let pose = self.relative_pose_tm();
            match self.tm_link.send_relative_pose(pose, time_ms) {
                Ok(true) => (),
                Ok(false) => debug!("Relative pose TM refused, will retry next period"),
                Err(e) => warn!("Could not send the relative pose: {}", e),
            }
        }

        if self.abs_pose_pending {
            self.send_absolute_pose();
        }

        // ---- MONITORING ----

        if period_elapsed(self.last_monitoring_tm_ms, time_ms, self.params.monitoring_tm_period_s)
        {
            self.last_monitoring_tm_ms = Some(time_ms);

            match self.eqpt.battery.start_read() {
                Ok(()) => self.battery_read_pending = true,
                Err(e) => warn!("Could not start a battery reading: {}", e),
            }
        }

        if self.battery_read_pending {
            if let Some(v) = self.eqpt.battery.poll_voltage() {
                self.battery_read_pending = false;
                self.last_battery_v = Some(v);

                match self.tm_link.send_monitoring(v, time_ms) {
                    Ok(true) => (),
                    Ok(false) => debug!("Monitoring TM refused, will retry next period"),
                    Err(e) => warn!("Could not send monitoring TM: {}", e),
                }
            }
        }

        // ---- SWEEPS ----

        self.downlink.service(&mut self.tm_link, time_ms);
    }

    /// Send the absolute pose if a GPS fix is available.
    ///
    /// If there is no fix yet, or the link refuses the message, it is sent once possible.
    pub(crate) fn send_absolute_pose(&mut self) {
        let pose = match self.loc.latest_fix() {
            Some(fix) => {
                let mut pose = self.relative_pose_tm();
                pose.x = fix.longitude_deg as f32;
                pose.y = fix.latitude_deg as f32;
                pose.z = fix.altitude_m as f32;
                pose
            }
            None => {
                self.abs_pose_pending = true;
                return;
            }
        };

        match self.tm_link.send_absolute_pose(pose, self.time_ms) {
            Ok(true) => self.abs_pose_pending = false,
            Ok(false) => self.abs_pose_pending = true,
            Err(e) => {
                warn!("Could not send the absolute pose: {}", e);
                self.abs_pose_pending = false;
            }
        }
    }

    fn relative_pose_tm(&self) -> PoseTm {
        let pose = self.loc.estimate_to_pose2d();
        let (roll, pitch) = match self.loc.latest_imu() {
            Some(r) => (r.euler_rad[0], r.euler_rad[1]),
            None => (0.0, 0.0),
        };

        PoseTm {
            x: pose.x() as f32,
            y: pose.y() as f32,
            z: 0.0,
            yaw: pose.theta() as f32,
            roll: roll as f32,
            pitch: pitch as f32,
        }
    }
}

/// True if at least `period_s` has passed since `last_ms`, or nothing has been sent yet.
fn period_elapsed(last_ms: Option<u64>, now_ms: u64, period_s: f64) -> bool {
    match last_ms {
        Some(l) => now_ms.saturating_sub(l) as f64 >= period_s * 1000.0,
        None => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_period_elapsed() {
        assert!(period_elapsed(None, 0, 1.0));
        assert!(!period_elapsed(Some(0), 999, 1.0));
        assert!(period_elapsed(Some(0), 1000, 1.0));
        assert!(!period_elapsed(Some(2000), 1000, 1.0));
    }
}
