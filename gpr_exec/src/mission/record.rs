//! # Record state

use log::{error, info, warn};

use super::{EndStatus, MissionCtx, MissionError};
use crate::drive_ctrl::OutputData;

/// Record a radar sweep while stationary.
#[derive(Debug, Default)]
pub struct Record {
    /// Set if the sweep could not be started
    start_failed: bool,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, ctx: &mut MissionCtx) -> Result<(), MissionError> {
        ctx.stop_motors()?;

        let sweep = ctx.gpr_mgr.params().sweep;
        if let Err(e) = ctx.gpr_mgr.start_sweep(&sweep) {
            error!("Could not start the sweep: {}", e);
            self.start_failed = true;
        }

        Ok(())
    }

    pub fn step(&mut self, ctx: &mut MissionCtx) -> Result<EndStatus, MissionError> {
        if self.start_failed {
            warn!("No recording made at this stop");
            return Ok(EndStatus::RecordingComplete);
        }

        if ctx.switch_pressed() {
            info!("Recording stopped by the operator");
            ctx.gpr_mgr.abort();
            return Ok(EndStatus::SystemDisabled);
        }

        ctx.apply_duty(&OutputData::default())?;

        match ctx.gpr_mgr.proc() {
            Ok(true) => return Ok(EndStatus::NoChange),
            Ok(false) => (),
            Err(e) => {
                error!("Error during the sweep, keeping the steps recorded so far: {}", e);
                ctx.gpr_mgr.abort();
            }
        }

        let (data, inactive) = ctx.gpr_mgr.get_data();
        if !inactive {
            return Ok(EndStatus::NoChange);
        }
        let data = data.clone();

        ctx.num_sweeps += 1;
        info!(
            "Sweep {} recorded with {} steps",
            ctx.num_sweeps, data.actual_num_steps
        );

        if let Some(ref s) = ctx.session {
            s.save(format!("gpr/sweep_{:03}.json", ctx.num_sweeps), data.clone());
        }
        ctx.downlink.queue(data);

        Ok(EndStatus::RecordingComplete)
    }

    pub fn exit(&mut self, ctx: &mut MissionCtx) -> Result<(), MissionError> {
        ctx.gpr_mgr.abort();
        Ok(())
    }
}
