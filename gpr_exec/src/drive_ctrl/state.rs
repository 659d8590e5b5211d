//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::{
    state_vel_to_wheel_vel, DriveCtrlError, Params, PidController, MAX_DUTY_PCT,
    SPEED_ZERO_THRESHOLD_MS, TURN_ZERO_THRESHOLD_RADS,
};
use crate::loc::Estimate;
use util::{
    archive::{Archived, Archiver},
    maths::{ang_dist, clamp},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
#[derive(Default)]
pub struct DriveCtrl {
    pub(crate) params: Params,

    setpoint: Setpoint,

    /// Set when the heading hold target shall be latched on the next cycle.
    hold_armed: bool,

    /// Heading to hold while the turn setpoint is zero.
    hold_heading_rad: Option<f64>,

    left_pid: PidController,
    right_pid: PidController,
    head_pid: PidController,

    report: StatusReport,
    arch_report: Archiver,
}

/// Velocity setpoint of the rover.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Setpoint {
    /// Units: meters/second
    pub forward_ms: f64,

    /// Units: radians/second, positive anticlockwise
    pub turn_rads: f64,
}

/// Input data to Drive Control.
#[derive(Debug, Copy, Clone)]
pub struct InputData {
    /// The current localisation estimate
    pub estimate: Estimate,

    /// Current time
    pub time_ms: u64,
}

/// Duty cycle demands for the motors.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct OutputData {
    /// Units: percent, [-100, 100]
    pub left_pct: f64,

    /// Units: percent, [-100, 100]
    pub right_pct: f64,
}

/// Status report for DriveCtrl processing.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct StatusReport {
    pub time_ms: u64,
    pub forward_sp_ms: f64,
    pub turn_sp_rads: f64,
    pub setpoint_scaled: bool,
    pub heading_hold: bool,
    pub hold_heading_rad: f64,
    pub head_trim_rads: f64,
    pub left_sp_ms: f64,
    pub right_sp_ms: f64,
    pub left_meas_ms: f64,
    pub right_meas_ms: f64,
    pub left_pct: f64,
    pub right_pct: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Create a new instance from already loaded parameters, without archiving.
    pub fn new(params: Params) -> Self {
        let mut dc = Self::default();
        dc.set_params(params);
        dc
    }

    fn set_params(&mut self, params: Params) {
        self.left_pid = PidController::from_gains(&params.wheel_pid_gains);
        self.right_pid = PidController::from_gains(&params.wheel_pid_gains);
        self.head_pid = PidController::from_gains(&params.head_pid_gains);
        self.params = params;
        self.hold_armed = true;
    }

    /// The current setpoint.
    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    /// The heading currently held, if any.
    pub fn hold_heading(&self) -> Option<f64> {
        self.hold_heading_rad
    }

    /// Change the velocity setpoint.
    ///
    /// If either wheel would need to exceed the maximum wheel speed both components are scaled
    /// down by the same factor, so the curvature of the motion is preserved. Returns true if the
    /// setpoint was scaled.
    pub fn change_setpoint(
        &mut self,
        forward_ms: f64,
        turn_rads: f64,
    ) -> Result<bool, DriveCtrlError> {
        if !forward_ms.is_finite() || !turn_rads.is_finite() {
            return Err(DriveCtrlError::InvalidSetpoint(forward_ms, turn_rads));
        }

        let mut sp = Setpoint { forward_ms, turn_rads };
        let mut scaled = false;

        let max_ms = state_vel_to_wheel_vel(forward_ms, turn_rads, self.params.wheel_base_m)
            .max_abs();
        if max_ms > self.params.max_wheel_speed_ms {
            let scale = max_ms / self.params.max_wheel_speed_ms;
            sp.forward_ms /= scale;
            sp.turn_rads /= scale;
            scaled = true;
        }

        // Turning has stopped, hold the heading we end up on
        if sp.turn_rads.abs() < TURN_ZERO_THRESHOLD_RADS
            && self.setpoint.turn_rads.abs() >= TURN_ZERO_THRESHOLD_RADS
        {
            self.hold_armed = true;
        }

        self.setpoint = sp;
        self.report.setpoint_scaled = scaled;

        Ok(scaled)
    }

    /// Stop the rover, zeroing the setpoint and resetting all controllers.
    ///
    /// Returns the zero duty cycle demand to send to the motors.
    pub fn stop(&mut self) -> OutputData {
        self.setpoint = Setpoint::default();
        self.left_pid.reset();
        self.right_pid.reset();
        self.head_pid.reset();
        self.hold_armed = true;
        self.hold_heading_rad = None;

        debug!("DriveCtrl stopped");

        OutputData::default()
    }

    /// Convert a wheel speed into a duty cycle using the linear motor model.
    pub fn speed_to_duty(&self, speed_ms: f64) -> f64 {
        if speed_ms.abs() < SPEED_ZERO_THRESHOLD_MS {
            return 0.0;
        }

        let pct = speed_ms.signum()
            * (self.params.motor_slope_pct_per_ms * speed_ms.abs()
                + self.params.motor_static_offset_pct);

        clamp(&pct, &-MAX_DUTY_PCT, &MAX_DUTY_PCT)
    }
}

impl State for DriveCtrl {
    type InitData = &'static str;
    type InitError = DriveCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data).map_err(DriveCtrlError::ParamLoadError)?;
        self.set_params(params);

        self.arch_report = Archiver::from_path(session, "drive_ctrl/status_report.csv")
            .map_err(|e| DriveCtrlError::ArchiveInitError(e.to_string()))?;

        Ok(())
    }

    /// Perform cyclic processing of Drive Control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let est = &input_data.estimate;
        let time_ms = input_data.time_ms;
        let scaled = self.report.setpoint_scaled;

        self.report = StatusReport {
            time_ms,
            forward_sp_ms: self.setpoint.forward_ms,
            turn_sp_rads: self.setpoint.turn_rads,
            setpoint_scaled: scaled,
            ..Default::default()
        };

        // Latch the heading to hold
        if self.hold_armed {
            self.hold_heading_rad = Some(est.pose.theta());
            self.head_pid.reset();
            self.hold_armed = false;
        }

        // Heading hold trim while not turning
        let mut turn_rads = self.setpoint.turn_rads;
        if turn_rads.abs() < TURN_ZERO_THRESHOLD_RADS {
            if let Some(hold) = self.hold_heading_rad {
                let err = ang_dist(est.pose.theta(), hold);
                let trim = self.head_pid.get_from_error(err, time_ms);
                let max = self.params.max_head_trim_rads;
                turn_rads = clamp(&trim, &-max, &max);

                self.report.heading_hold = true;
                self.report.hold_heading_rad = hold;
                self.report.head_trim_rads = turn_rads;
            }
        }

        let wb = self.params.wheel_base_m;
        let sp = state_vel_to_wheel_vel(self.setpoint.forward_ms, turn_rads, wb);
        let meas = state_vel_to_wheel_vel(est.forward_vel_ms, est.yaw_rate_rads, wb);

        // Wheel velocity loops trim the setpoints
        let left_ms = sp.left_ms + self.left_pid.get(sp.left_ms, meas.left_ms, time_ms);
        let right_ms = sp.right_ms + self.right_pid.get(sp.right_ms, meas.right_ms, time_ms);

        let output = OutputData {
            left_pct: self.speed_to_duty(left_ms),
            right_pct: self.speed_to_duty(right_ms),
        };

        self.report.left_sp_ms = sp.left_ms;
        self.report.right_sp_ms = sp.right_ms;
        self.report.left_meas_ms = meas.left_ms;
        self.report.right_meas_ms = meas.right_ms;
        self.report.left_pct = output.left_pct;
        self.report.right_pct = output.right_pct;

        trace!(
            "DriveCtrl output: L {:.1} %, R {:.1} %",
            output.left_pct,
            output.right_pct
        );

        Ok((output, self.report))
    }
}

impl Archived for DriveCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(self.report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Pose2D;

    fn test_params() -> Params {
        Params {
            wheel_base_m: 0.2,
            max_wheel_speed_ms: 1.0,
            max_head_trim_rads: 0.5,
            wheel_pid_gains: [0.2, 0.0, 0.0],
            head_pid_gains: [1.0, 0.0, 0.0],
            motor_slope_pct_per_ms: 80.0,
            motor_static_offset_pct: 10.0,
        }
    }

    fn input(theta: f64, v: f64, w: f64, time_ms: u64) -> InputData {
        InputData {
            estimate: Estimate {
                pose: Pose2D::new(0.0, 0.0, theta),
                forward_vel_ms: v,
                yaw_rate_rads: w,
            },
            time_ms,
        }
    }

    #[test]
    fn test_setpoint_scaling() {
        let mut dc = DriveCtrl::new(test_params());

        // Within limits
        assert!(!dc.change_setpoint(0.5, 1.0).unwrap());
        assert_eq!(dc.setpoint(), Setpoint { forward_ms: 0.5, turn_rads: 1.0 });

        // Right wheel would need 1.0 + 0.1 * 4 = 1.4 m/s
        assert!(dc.change_setpoint(1.0, 4.0).unwrap());
        let sp = dc.setpoint();
        assert!((sp.forward_ms - 1.0 / 1.4).abs() < 1e-12);
        assert!((sp.turn_rads - 4.0 / 1.4).abs() < 1e-12);
        // Curvature preserved
        assert!((sp.turn_rads / sp.forward_ms - 4.0).abs() < 1e-9);

        assert!(dc.change_setpoint(std::f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_motor_model() {
        let dc = DriveCtrl::new(test_params());
        assert_eq!(dc.speed_to_duty(0.0), 0.0);
        assert_eq!(dc.speed_to_duty(0.0005), 0.0);
        assert!((dc.speed_to_duty(0.5) - 50.0).abs() < 1e-12);
        assert!((dc.speed_to_duty(-0.5) + 50.0).abs() < 1e-12);
        assert_eq!(dc.speed_to_duty(5.0), 100.0);
        assert_eq!(dc.speed_to_duty(-5.0), -100.0);
    }

    #[test]
    fn test_proc_at_rest_is_zero() {
        let mut dc = DriveCtrl::new(test_params());
        let (out, rpt) = dc.proc(&input(0.3, 0.0, 0.0, 0)).unwrap();
        assert_eq!(out, OutputData::default());
        assert!(rpt.heading_hold);
        assert!((dc.hold_heading().unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_heading_hold() {
        let mut dc = DriveCtrl::new(test_params());

        // Turning: no hold trim
        dc.change_setpoint(0.0, 1.0).unwrap();
        let (out, rpt) = dc.proc(&input(0.0, 0.0, 1.0, 0)).unwrap();
        assert!(!rpt.heading_hold);
        assert!(out.left_pct < 0.0 && out.right_pct > 0.0);

        // Stop turning, the hold latches onto the heading at the next cycle
        dc.change_setpoint(0.5, 0.0).unwrap();
        dc.proc(&input(1.0, 0.5, 0.0, 10)).unwrap();
        assert!((dc.hold_heading().unwrap() - 1.0).abs() < 1e-12);

        // Drifted clockwise, the trim turns back anticlockwise
        let (out, rpt) = dc.proc(&input(0.9, 0.5, 0.0, 20)).unwrap();
        assert!(rpt.heading_hold);
        assert!((rpt.head_trim_rads - 0.1).abs() < 1e-9);
        assert!(out.right_pct > out.left_pct);

        // Trim is limited
        let (_, rpt) = dc.proc(&input(-1.0, 0.5, 0.0, 30)).unwrap();
        assert!((rpt.head_trim_rads - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_stop() {
        let mut dc = DriveCtrl::new(test_params());
        dc.change_setpoint(0.5, 0.0).unwrap();
        dc.proc(&input(0.0, 0.2, 0.0, 0)).unwrap();

        assert_eq!(dc.stop(), OutputData::default());
        assert_eq!(dc.setpoint(), Setpoint::default());
        assert_eq!(dc.hold_heading(), None);

        let (out, _) = dc.proc(&input(0.0, 0.0, 0.0, 10)).unwrap();
        assert_eq!(out, OutputData::default());
    }
}
