//! # Initialize state

use log::info;

use super::{EndStatus, MissionCtx, MissionError};
use crate::{area_search::SearchArea, loc::SensorKind};

/// One-shot bring-up of the equipment and modules.
#[derive(Debug, Default)]
pub struct Initialize;

impl Initialize {
    pub fn new() -> Self {
        Self
    }

    pub fn step(&mut self, ctx: &mut MissionCtx) -> Result<EndStatus, MissionError> {
        let session = ctx.session.as_ref();

        ctx.eqpt
            .drive
            .init()
            .map_err(|e| init_failed("drive actuator", e))?;
        ctx.eqpt
            .battery
            .init()
            .map_err(|e| init_failed("battery monitor", e))?;
        ctx.loc.init().map_err(|e| init_failed("LocMgr", e))?;
        ctx.gpr_mgr
            .init(session)
            .map_err(|e| init_failed("GprMgr", e))?;
        ctx.tm_link.init().map_err(|e| init_failed("TmLink", e))?;

        // Motors inert until enabled
        ctx.stop_motors().map_err(|e| init_failed("drive actuator", e))?;

        for kind in [
            SensorKind::LeftEncoder,
            SensorKind::RightEncoder,
            SensorKind::Imu,
            SensorKind::Gps,
        ]
        .iter()
        {
            ctx.loc
                .enable(*kind)
                .map_err(|e| init_failed("LocMgr", e))?;
        }

        // Initial estimate, from which the area is laid out
        ctx.estimate = ctx.loc.update_estimates(ctx.time_ms);
        let origin = ctx.estimate.pose;

        let area = SearchArea::generate_area(&ctx.area_params, origin)
            .map_err(|e| init_failed("AreaSearch", e))?;

        info!(
            "Search area generated from ({:.3}, {:.3}, {:.3}) with {} destinations",
            origin.x(),
            origin.y(),
            origin.theta(),
            area.num_destinations()
        );
        ctx.area = Some(area);

        ctx.send_absolute_pose();

        info!("Initialisation complete");

        Ok(EndStatus::InitializationComplete)
    }
}

fn init_failed<E: std::fmt::Display>(what: &str, e: E) -> MissionError {
    MissionError::InitFailed(format!("{}: {}", what, e))
}
