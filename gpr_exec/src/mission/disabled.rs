//! # Disabled state

use log::{info, warn};

use super::{EndStatus, MissionCtx, MissionError};
use crate::drive_ctrl::OutputData;

/// The motors are inert until the operator enables the rover.
///
/// Once the search area is complete the rover is never enabled again.
#[derive(Debug, Default)]
pub struct Disabled {
    complete_reported: bool,
}

impl Disabled {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, ctx: &mut MissionCtx) -> Result<(), MissionError> {
        ctx.stop_motors()?;
        info!("Rover disabled");
        Ok(())
    }

    pub fn step(&mut self, ctx: &mut MissionCtx) -> Result<EndStatus, MissionError> {
        ctx.apply_duty(&OutputData::default())?;

        let complete = ctx.area.as_ref().map(|a| a.is_complete()).unwrap_or(true);
        if complete {
            if !self.complete_reported {
                info!("Area search complete, the rover will remain disabled");
                self.complete_reported = true;
            }
            if ctx.switch_pressed() {
                warn!("Enable switch pressed but the area search is complete");
            }
            return Ok(EndStatus::NoChange);
        }

        if ctx.params.auto_enable && !ctx.auto_enable_used {
            ctx.auto_enable_used = true;
            info!("Rover auto enabled");
            return Ok(EndStatus::SystemEnabled);
        }

        if ctx.switch_pressed() {
            info!("Rover enabled by the operator");
            return Ok(EndStatus::SystemEnabled);
        }

        Ok(EndStatus::NoChange)
    }
}
