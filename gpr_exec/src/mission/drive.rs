//! # Drive state

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};

use util::{archive::Archived, module::State};

use super::{EndStatus, MissionCtx, MissionError};
use crate::{area_search::Destination, drive_ctrl, traj_ctrl};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Drive to the next destination of the search area.
#[derive(Debug, Default)]
pub struct Drive {
    /// The destination being driven to, `None` if the search is complete
    dest: Option<Destination>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Drive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, ctx: &mut MissionCtx) -> Result<(), MissionError> {
        self.plan_next(ctx)
    }

    pub fn step(&mut self, ctx: &mut MissionCtx) -> Result<EndStatus, MissionError> {
        let dest = match self.dest {
            Some(d) => d,
            None => {
                info!("Area search complete");
                return Ok(EndStatus::SystemDisabled);
            }
        };

        if ctx.switch_pressed() {
            info!("Rover stopped by the operator");
            return Ok(EndStatus::SystemDisabled);
        }

        let time_ms = ctx.time_ms;
        let estimate = ctx.estimate;

        // ---- TRAJECTORY ----

        let (setpoint, traj_rpt) = ctx.traj_ctrl.proc(&traj_ctrl::InputData {
            pose: estimate.pose,
            time_ms,
        })?;

        if ctx.session.is_some() {
            if let Err(e) = ctx.traj_ctrl.write() {
                warn!("Could not write TrajCtrl archive: {}", e);
            }
        }

        if traj_rpt.off_course {
            error!("Rover off course driving to destination {}, stopping", dest.index);
            return Ok(EndStatus::SystemDisabled);
        }

        if traj_rpt.complete {
            info!(
                "Destination {} reached at ({:.3}, {:.3}, {:.3})",
                dest.index,
                estimate.pose.x(),
                estimate.pose.y(),
                estimate.pose.theta()
            );
            ctx.stop_motors()?;

            if dest.line_complete && !ctx.params.record_at_lane_start {
                debug!("No recording at the start of a pass");
                self.plan_next(ctx)?;
                return Ok(EndStatus::NoChange);
            }

            return Ok(EndStatus::TrajectoryComplete);
        }

        // ---- DRIVE ----

        ctx.drive_ctrl
            .change_setpoint(setpoint.forward_ms, setpoint.turn_rads)?;

        let (duty, _) = ctx.drive_ctrl.proc(&drive_ctrl::InputData { estimate, time_ms })?;

        if ctx.session.is_some() {
            if let Err(e) = ctx.drive_ctrl.write() {
                warn!("Could not write DriveCtrl archive: {}", e);
            }
        }

        ctx.apply_duty(&duty)?;

        Ok(EndStatus::NoChange)
    }

    pub fn exit(&mut self, ctx: &mut MissionCtx) -> Result<(), MissionError> {
        ctx.traj_ctrl.abort();
        ctx.stop_motors()?;
        Ok(())
    }

    /// Take the next destination and plan a trajectory to it.
    fn plan_next(&mut self, ctx: &mut MissionCtx) -> Result<(), MissionError> {
        self.dest = ctx.area.as_mut().and_then(|a| a.retrieve_next_destination());

        let dest = match self.dest {
            Some(d) => d,
            None => return Ok(()),
        };

        let start = ctx.estimate.pose;
        ctx.traj_ctrl
            .calculate_trajectory(&start, &dest.pose, ctx.params.speed_multiplier)?;

        info!(
            "Driving to destination {} at ({:.3}, {:.3}, {:.3})",
            dest.index,
            dest.pose.x(),
            dest.pose.y(),
            dest.pose.theta()
        );

        Ok(())
    }
}
