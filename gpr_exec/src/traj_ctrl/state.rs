//! Implementations for the TrajCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::{Params, Profile, TrajCtrlError};
use crate::{drive_ctrl::Setpoint, loc::Pose2D};
use util::{
    archive::{Archived, Archiver},
    maths::{ang_dist, clamp},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of phases in a trajectory.
pub const NUM_PHASES: usize = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control module state
#[derive(Default)]
pub struct TrajCtrl {
    pub(crate) params: Params,

    trajectory: Option<Trajectory>,

    report: StatusReport,
    arch_report: Archiver,
}

/// A point to point trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub phases: [TrajectoryPhase; NUM_PHASES],

    /// Index of the phase being executed. Equal to `NUM_PHASES` once the
    /// trajectory is complete.
    pub current: usize,

    /// Fraction of the maximum speed used to build the profiles.
    pub speed_multiplier: f64,
}

/// One phase of a trajectory.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct TrajectoryPhase {
    pub kind: PhaseKind,

    /// Profile of the phase. Rotation phases are in radians and
    /// radians/second, the drive phase in meters and meters/second.
    pub profile: Profile,

    /// Pose at which the phase starts.
    pub start: Pose2D,

    /// Pose at which the phase ends.
    pub end: Pose2D,
}

/// Input data to Trajectory Control.
#[derive(Debug, Copy, Clone)]
pub struct InputData {
    /// Current pose estimate
    pub pose: Pose2D,

    /// Current time
    pub time_ms: u64,
}

/// Status report for TrajCtrl processing.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct StatusReport {
    pub time_ms: u64,

    /// Phase being followed at the start of the cycle
    pub phase: Option<PhaseKind>,

    /// Position of the rover within the phase
    pub in_phase_pos: f64,

    /// Deviation from the phase start, meters for rotations and radians for
    /// the drive phase
    pub deviation: f64,

    pub forward_sp_ms: f64,
    pub turn_sp_rads: f64,

    /// True if the phase completed during this cycle
    pub phase_advanced: bool,

    /// True if the whole trajectory is complete
    pub complete: bool,

    /// True if the rover has deviated too far from the phase
    pub off_course: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum PhaseKind {
    InitialRotation,
    Drive,
    FinalRotation,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PhaseKind {
    pub fn is_rotation(&self) -> bool {
        !matches!(self, PhaseKind::Drive)
    }
}

impl Trajectory {
    /// Plan a trajectory from `start` to `end`.
    ///
    /// The speed multiplier is clamped to [0, 1].
    pub fn plan(
        start: &Pose2D,
        end: &Pose2D,
        speed_multiplier: f64,
        params: &Params,
    ) -> Result<Self, TrajCtrlError> {
        let finite = |p: &Pose2D| p.x().is_finite() && p.y().is_finite() && p.theta().is_finite();
        if !finite(start) || !finite(end) {
            return Err(TrajCtrlError::InvalidPose);
        }
        if speed_multiplier.is_nan() {
            return Err(TrajCtrlError::InvalidMultiplier(speed_multiplier));
        }

        let mult = clamp(&speed_multiplier, &0.0, &1.0);
        let speed = params.max_speed_ms * mult;
        let accel = params.max_accel_mss;
        let half_wb = params.wheel_base_m / 2.0;

        // Bearing to the target, or the current heading if already there
        let delta = end.position_m - start.position_m;
        let dist_m = delta.norm();
        let bearing = if dist_m < params.pos_stopband_m {
            start.theta()
        }
        else {
            delta[1].atan2(delta[0])
        };

        let rotation = |from: &Pose2D, to: &Pose2D| {
            let angle = ang_dist(from.theta(), to.theta());
            Profile::new(angle * half_wb, speed, accel).scaled(1.0 / half_wb)
        };

        let facing_start = Pose2D::from_parts(start.position_m, bearing);
        let facing_end = Pose2D::from_parts(end.position_m, bearing);

        let phases = [
            TrajectoryPhase {
                kind: PhaseKind::InitialRotation,
                profile: rotation(start, &facing_start),
                start: *start,
                end: facing_start,
            },
            TrajectoryPhase {
                kind: PhaseKind::Drive,
                profile: Profile::new(dist_m, speed, accel),
                start: facing_start,
                end: facing_end,
            },
            TrajectoryPhase {
                kind: PhaseKind::FinalRotation,
                profile: rotation(&facing_end, end),
                start: facing_end,
                end: *end,
            },
        ];

        Ok(Self {
            phases,
            current: 0,
            speed_multiplier: mult,
        })
    }

    /// True once all phases have been completed.
    pub fn is_complete(&self) -> bool {
        self.current >= NUM_PHASES
    }

    /// The phase currently being followed.
    pub fn current_phase(&self) -> Option<&TrajectoryPhase> {
        self.phases.get(self.current)
    }
}

impl TrajCtrl {
    /// Create a new instance from already loaded parameters, without archiving.
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Plan a new trajectory from `start` to `end`, replacing any existing one.
    pub fn calculate_trajectory(
        &mut self,
        start: &Pose2D,
        end: &Pose2D,
        speed_multiplier: f64,
    ) -> Result<(), TrajCtrlError> {
        let traj = Trajectory::plan(start, end, speed_multiplier, &self.params)?;

        debug!(
            "New trajectory ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3}), profiles {:?}/{:?}/{:?}",
            start.x(), start.y(), start.theta(),
            end.x(), end.y(), end.theta(),
            traj.phases[0].profile.shape,
            traj.phases[1].profile.shape,
            traj.phases[2].profile.shape,
        );

        self.trajectory = Some(traj);

        Ok(())
    }

    /// Drop the current trajectory.
    pub fn abort(&mut self) {
        if let Some(t) = self.trajectory.take() {
            if !t.is_complete() {
                info!("Trajectory aborted");
            }
        }
    }

    /// The current trajectory.
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// True if there is a trajectory and it has been completed.
    pub fn is_complete(&self) -> bool {
        self.trajectory
            .as_ref()
            .map(|t| t.is_complete())
            .unwrap_or(false)
    }
}

impl State for TrajCtrl {
    type InitData = &'static str;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = Setpoint;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        self.params = params::load(init_data).map_err(TrajCtrlError::ParamLoadError)?;

        self.arch_report = Archiver::from_path(session, "traj_ctrl/status_report.csv")
            .map_err(|e| TrajCtrlError::ArchiveInitError(e.to_string()))?;

        Ok(())
    }

    /// Follow the current trajectory.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let params = &self.params;
        let report = &mut self.report;
        *report = StatusReport {
            time_ms: input_data.time_ms,
            ..Default::default()
        };

        let traj = self.trajectory.as_mut().ok_or(TrajCtrlError::NoTrajectory)?;
        let pose = &input_data.pose;

        let phase = match traj.current_phase() {
            Some(p) => *p,
            None => {
                report.complete = true;
                return Ok((Setpoint::default(), *report));
            }
        };
        report.phase = Some(phase.kind);

        let rotation = phase.kind.is_rotation();
        let stopband = if rotation {
            params.ang_stopband_rad
        }
        else {
            params.pos_stopband_m
        };

        // ---- COMPLETION ----

        let remaining = if rotation {
            ang_dist(pose.theta(), phase.end.theta()).abs()
        }
        else {
            pose.distance_to(&phase.end)
        };

        if remaining < stopband {
            traj.current += 1;
            report.phase_advanced = true;
            report.complete = traj.is_complete();

            if report.complete {
                info!("Trajectory complete");
            }
            else {
                debug!("{:?} complete", phase.kind);
            }

            return Ok((Setpoint::default(), *report));
        }

        // ---- OFF COURSE ----

        // Rotations shall not move the rover, driving shall not turn it
        report.deviation = if rotation {
            pose.distance_to(&phase.start)
        }
        else {
            ang_dist(phase.start.theta(), pose.theta()).abs()
        };

        let deviation_limit = params.off_course_factor * if rotation {
            params.pos_stopband_m
        }
        else {
            params.ang_stopband_rad
        };

        if report.deviation > deviation_limit {
            warn!(
                "Rover off course during {:?}: deviation {:.4} exceeds {:.4}",
                phase.kind, report.deviation, deviation_limit
            );
            report.off_course = true;
            return Ok((Setpoint::default(), *report));
        }

        // ---- SETPOINT ----

        report.in_phase_pos = if rotation {
            ang_dist(phase.start.theta(), pose.theta())
        }
        else {
            (pose.position_m - phase.start.position_m).dot(&phase.start.forward())
        };

        let mut vel = match phase.profile.velocity_at(report.in_phase_pos, stopband) {
            Some(v) => v,
            None => {
                warn!(
                    "Rover position {:.4} is outside the {:?} profile",
                    report.in_phase_pos, phase.kind
                );
                report.off_course = true;
                return Ok((Setpoint::default(), *report));
            }
        };

        // Keep moving towards the end of the phase at the at-rest breakpoints
        let floor = if rotation {
            params.min_turn_rate_rads
        }
        else {
            params.min_speed_ms
        };
        let to_go = phase.profile.distance() - report.in_phase_pos;
        if vel.abs() < floor && to_go != 0.0 {
            vel = floor * to_go.signum();
        }

        let setpoint = if rotation {
            Setpoint { forward_ms: 0.0, turn_rads: vel }
        }
        else {
            Setpoint { forward_ms: vel, turn_rads: 0.0 }
        };

        report.forward_sp_ms = setpoint.forward_ms;
        report.turn_sp_rads = setpoint.turn_rads;

        trace!(
            "TrajCtrl {:?} at {:.4}: setpoint ({:.3} m/s, {:.3} rad/s)",
            phase.kind, report.in_phase_pos, setpoint.forward_ms, setpoint.turn_rads
        );

        Ok((setpoint, *report))
    }
}

impl Archived for TrajCtrl {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(self.report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_ctrl::ProfileShape;
    use std::f64::consts::PI;

    fn test_params() -> Params {
        Params {
            max_speed_ms: 0.5,
            max_accel_mss: 1.0,
            wheel_base_m: 0.2,
            pos_stopband_m: 0.03,
            ang_stopband_rad: 0.01,
            off_course_factor: 2.0,
            min_speed_ms: 0.05,
            min_turn_rate_rads: 0.2,
        }
    }

    fn follow(tc: &mut TrajCtrl, x: f64, y: f64, theta: f64) -> (Setpoint, StatusReport) {
        tc.proc(&InputData {
            pose: Pose2D::new(x, y, theta),
            time_ms: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_plan_phases() {
        let traj = Trajectory::plan(
            &Pose2D::new(0.0, 0.0, 0.0),
            &Pose2D::new(0.0, 2.0, PI),
            1.0,
            &test_params(),
        )
        .unwrap();

        let [init, drive, fin] = traj.phases;

        assert_eq!(init.kind, PhaseKind::InitialRotation);
        assert!((init.end.theta() - PI / 2.0).abs() < 1e-12);
        assert!((init.profile.distance() - PI / 2.0).abs() < 1e-12);
        // 0.5 m/s at the wheel edge is 5 rad/s
        assert!(init.profile.peak_velocity() <= 5.0 + 1e-12);

        assert_eq!(drive.kind, PhaseKind::Drive);
        assert_eq!(drive.profile.shape, ProfileShape::Trapezoidal);
        assert!((drive.profile.distance() - 2.0).abs() < 1e-12);
        assert!((drive.start.theta() - PI / 2.0).abs() < 1e-12);
        assert!((drive.end.y() - 2.0).abs() < 1e-12);

        assert_eq!(fin.kind, PhaseKind::FinalRotation);
        assert!((fin.profile.distance() - PI / 2.0).abs() < 1e-12);
        assert!((fin.end.theta() - PI).abs() < 1e-12);
    }

    #[test]
    fn test_plan_speed_multiplier() {
        let p = test_params();
        let start = Pose2D::new(0.0, 0.0, 0.0);
        let end = Pose2D::new(0.2, 0.0, 0.0);

        // Full speed: boundary 0.25 m, so 0.2 m is triangular
        let t = Trajectory::plan(&start, &end, 1.0, &p).unwrap();
        assert_eq!(t.phases[1].profile.shape, ProfileShape::Triangular);

        // Half speed: boundary 0.0625 m
        let t = Trajectory::plan(&start, &end, 0.5, &p).unwrap();
        assert_eq!(t.phases[1].profile.shape, ProfileShape::Trapezoidal);
        assert!((t.phases[1].profile.peak_velocity() - 0.25).abs() < 1e-12);

        // Clamped
        let t = Trajectory::plan(&start, &end, 3.0, &p).unwrap();
        assert_eq!(t.speed_multiplier, 1.0);

        assert!(Trajectory::plan(&start, &end, std::f64::NAN, &p).is_err());
    }

    #[test]
    fn test_plan_in_place() {
        // Target position within the stopband, bearing is the current heading
        let t = Trajectory::plan(
            &Pose2D::new(1.0, 1.0, 0.5),
            &Pose2D::new(1.01, 1.0, 0.5),
            1.0,
            &test_params(),
        )
        .unwrap();

        assert!(t.phases[0].profile.distance().abs() < 1e-12);
        assert!(t.phases[2].profile.distance().abs() < 1e-12);
    }

    #[test]
    fn test_follow_in_order() {
        let mut tc = TrajCtrl::new(test_params());
        assert!(matches!(
            tc.proc(&InputData { pose: Pose2D::default(), time_ms: 0 }),
            Err(TrajCtrlError::NoTrajectory)
        ));

        tc.calculate_trajectory(
            &Pose2D::new(0.0, 0.0, 0.0),
            &Pose2D::new(0.0, 1.0, 0.0),
            1.0,
        )
        .unwrap();

        // At the start the rover turns anticlockwise at the minimum rate
        let (sp, rpt) = follow(&mut tc, 0.0, 0.0, 0.0);
        assert_eq!(rpt.phase, Some(PhaseKind::InitialRotation));
        assert_eq!(sp.forward_ms, 0.0);
        assert!((sp.turn_rads - 0.2).abs() < 1e-12);

        // Part way through the rotation the profile speed is used
        let (sp, _) = follow(&mut tc, 0.0, 0.0, 0.4);
        assert!(sp.turn_rads > 0.2);

        // Being at the target position does not skip the rotation
        let (_, rpt) = follow(&mut tc, 0.0, 1.0, 0.4);
        assert!(rpt.off_course);
        assert_eq!(tc.trajectory().unwrap().current, 0);

        // Rotation complete, zero setpoint on the advancing cycle
        let (sp, rpt) = follow(&mut tc, 0.0, 0.0, PI / 2.0 - 0.005);
        assert!(rpt.phase_advanced);
        assert_eq!(sp, Setpoint::default());
        assert_eq!(tc.trajectory().unwrap().current, 1);

        // Driving
        let (sp, rpt) = follow(&mut tc, 0.0, 0.5, PI / 2.0);
        assert_eq!(rpt.phase, Some(PhaseKind::Drive));
        assert!((rpt.in_phase_pos - 0.5).abs() < 1e-9);
        assert!((sp.forward_ms - 0.5).abs() < 1e-9);
        assert_eq!(sp.turn_rads, 0.0);

        follow(&mut tc, 0.0, 0.98, PI / 2.0);
        assert_eq!(tc.trajectory().unwrap().current, 2);

        // Final rotation back to 0 is clockwise
        let (sp, rpt) = follow(&mut tc, 0.0, 1.0, PI / 2.0);
        assert_eq!(rpt.phase, Some(PhaseKind::FinalRotation));
        assert!(sp.turn_rads < 0.0);

        let (_, rpt) = follow(&mut tc, 0.0, 1.0, 0.002);
        assert!(rpt.complete);
        assert!(tc.is_complete());

        // Once complete the output stays at zero
        let (sp, rpt) = follow(&mut tc, 0.0, 1.0, 0.002);
        assert!(rpt.complete);
        assert_eq!(sp, Setpoint::default());
    }

    #[test]
    fn test_off_course() {
        let mut tc = TrajCtrl::new(test_params());
        tc.calculate_trajectory(
            &Pose2D::new(0.0, 0.0, 0.0),
            &Pose2D::new(2.0, 0.0, 0.0),
            1.0,
        )
        .unwrap();

        // Initial rotation completes immediately
        let (_, rpt) = follow(&mut tc, 0.0, 0.0, 0.0);
        assert!(rpt.phase_advanced);

        // Heading drift within twice the stopband is tolerated
        let (_, rpt) = follow(&mut tc, 1.0, 0.0, 0.019);
        assert!(!rpt.off_course);

        let (sp, rpt) = follow(&mut tc, 1.0, 0.0, 0.021);
        assert!(rpt.off_course);
        assert_eq!(sp, Setpoint::default());

        // Behind the start of the profile
        let (_, rpt) = follow(&mut tc, -0.1, 0.0, 0.0);
        assert!(rpt.off_course);

        // Translation during a rotation
        tc.calculate_trajectory(
            &Pose2D::new(0.0, 0.0, 0.0),
            &Pose2D::new(0.0, 0.0, 1.0),
            1.0,
        )
        .unwrap();

        // No initial rotation or drive needed
        follow(&mut tc, 0.0, 0.0, 0.0);
        follow(&mut tc, 0.0, 0.0, 0.0);
        assert_eq!(tc.trajectory().unwrap().current, 2);

        let (_, rpt) = follow(&mut tc, 0.05, 0.0, 0.0);
        assert_eq!(rpt.phase, Some(PhaseKind::FinalRotation));
        assert!(!rpt.off_course);
        let (_, rpt) = follow(&mut tc, 0.07, 0.0, 0.0);
        assert!(rpt.off_course);

        tc.abort();
        assert!(tc.trajectory().is_none());
    }
}
