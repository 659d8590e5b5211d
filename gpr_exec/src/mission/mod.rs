//! # Mission module
//!
//! This module implements the mission [`Scheduler`], the state machine which runs the survey. The
//! mission is broken down into the following states:
//!
//! - `Initialize` - Bring up all equipment and modules and generate the search area.
//! - `Disabled` - The motors are inert, waiting for the operator to enable the rover.
//! - `Drive` - Drive to the next destination of the search area.
//! - `Record` - Record a radar sweep while stationary.
//!
//! Each cycle the scheduler switches to the next state if it has changed (running the exit and
//! enter hooks), steps the current state, and looks up the next state from the state's end status
//! in the transition table. Telemetry housekeeping runs every cycle once initialisation is
//! complete, whatever the state.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod ctx;
mod disabled;
mod downlink;
mod drive;
mod initialize;
mod params;
mod record;
mod tick;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt::Display;

use log::{error, info, warn};

pub use self::{
    ctx::{MissionCtx, MissionEqpt, MissionModules},
    downlink::SweepDownlink,
    params::MissionParams,
    tick::{StdTickSource, TickSource},
};

pub mod states {
    pub use super::disabled::Disabled;
    pub use super::drive::Drive;
    pub use super::initialize::Initialize;
    pub use super::record::Record;
}

use states::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The mission scheduler.
pub struct Scheduler {
    /// The active state
    current: MissionState,

    /// The state to switch to at the start of the next tick
    next: StateId,

    /// Set once the enter hook of the first state has run
    started: bool,

    num_ticks: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur in the mission.
#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("Initialisation failed: {0}")]
    InitFailed(String),

    #[error("DriveCtrl error: {0}")]
    DriveCtrlError(#[from] crate::drive_ctrl::DriveCtrlError),

    #[error("TrajCtrl error: {0}")]
    TrajCtrlError(#[from] crate::traj_ctrl::TrajCtrlError),

    #[error("GprMgr error: {0}")]
    GprMgrError(#[from] crate::gpr_mgr::GprMgrError),

    #[error("Equipment error: {0}")]
    EqptError(#[from] comms_if::eqpt::EqptError),
}

/// Identity of a mission state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateId {
    Initialize,
    Disabled,
    Drive,
    Record,
}

/// Outcome of stepping a state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndStatus {
    NoChange,
    InitializationComplete,
    SystemEnabled,
    SystemDisabled,
    TrajectoryComplete,
    RecordingComplete,
}

/// A mission state and its data.
#[derive(Debug)]
pub enum MissionState {
    Initialize(Initialize),
    Disabled(Disabled),
    Drive(Drive),
    Record(Record),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The transition table.
///
/// Returns `None` if there is no transition for the pair.
pub fn next_state(current: StateId, status: EndStatus) -> Option<StateId> {
    use EndStatus::*;

    match (current, status) {
        (s, NoChange) => Some(s),
        (StateId::Initialize, InitializationComplete) => Some(StateId::Disabled),
        (StateId::Disabled, SystemEnabled) => Some(StateId::Drive),
        (StateId::Drive, TrajectoryComplete) => Some(StateId::Record),
        (StateId::Drive, SystemDisabled) => Some(StateId::Disabled),
        (StateId::Record, RecordingComplete) => Some(StateId::Drive),
        (StateId::Record, SystemDisabled) => Some(StateId::Disabled),
        _ => None,
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Scheduler {
    pub fn new() -> Self {
        Self {
            current: MissionState::from_id(StateId::Initialize),
            next: StateId::Initialize,
            started: false,
            num_ticks: 0,
        }
    }

    /// Identity of the active state.
    pub fn state_id(&self) -> StateId {
        self.current.id()
    }

    /// Identity of the state which will be active on the next tick.
    pub fn next_state_id(&self) -> StateId {
        self.next
    }

    pub fn num_ticks(&self) -> u64 {
        self.num_ticks
    }

    /// Run one mission cycle.
    ///
    /// Only initialisation failures are returned as errors, any other error is handled by the
    /// state and reported through its end status.
    pub fn tick(&mut self, ctx: &mut MissionCtx, time_ms: u64) -> Result<EndStatus, MissionError> {
        let initialised = ctx.area.is_some();
        ctx.cycle_start(time_ms, initialised);

        // ---- STATE CHANGE ----

        if !self.started {
            self.current.enter(ctx);
            self.started = true;
        }
        else if self.next != self.current.id() {
            info!("Mission state change: {} -> {:?}", self.current, self.next);

            self.current.exit(ctx);
            self.current = MissionState::from_id(self.next);
            self.current.enter(ctx);
        }

        // ---- STEP ----

        let status = self.current.step(ctx)?;

        let id = self.current.id();
        self.next = match next_state(id, status) {
            Some(s) => s,
            None => {
                warn!("No transition from {:?} on {:?}, staying in {:?}", id, status, id);
                id
            }
        };

        // ---- HOUSEKEEPING ----

        if ctx.area.is_some() {
            ctx.housekeeping();
        }

        self.num_ticks += 1;

        Ok(status)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionState {
    fn from_id(id: StateId) -> Self {
        match id {
            StateId::Initialize => MissionState::Initialize(Initialize::new()),
            StateId::Disabled => MissionState::Disabled(Disabled::new()),
            StateId::Drive => MissionState::Drive(Drive::new()),
            StateId::Record => MissionState::Record(Record::new()),
        }
    }

    pub fn id(&self) -> StateId {
        match self {
            MissionState::Initialize(_) => StateId::Initialize,
            MissionState::Disabled(_) => StateId::Disabled,
            MissionState::Drive(_) => StateId::Drive,
            MissionState::Record(_) => StateId::Record,
        }
    }

    fn enter(&mut self, ctx: &mut MissionCtx) {
        let res = match self {
            MissionState::Initialize(_) => Ok(()),
            MissionState::Disabled(s) => s.enter(ctx),
            MissionState::Drive(s) => s.enter(ctx),
            MissionState::Record(s) => s.enter(ctx),
        };

        if let Err(e) = res {
            error!("Error entering {}: {}", self, e);
        }
    }

    fn step(&mut self, ctx: &mut MissionCtx) -> Result<EndStatus, MissionError> {
        let res = match self {
            // Initialisation errors are fatal
            MissionState::Initialize(s) => return s.step(ctx),
            MissionState::Disabled(s) => s.step(ctx),
            MissionState::Drive(s) => s.step(ctx),
            MissionState::Record(s) => s.step(ctx),
        };

        // Anything else disables the rover, keeping the system running
        match res {
            Ok(status) => Ok(status),
            Err(e) => {
                error!("Error in {}: {}", self, e);
                match self {
                    MissionState::Disabled(_) => Ok(EndStatus::NoChange),
                    _ => Ok(EndStatus::SystemDisabled),
                }
            }
        }
    }

    fn exit(&mut self, ctx: &mut MissionCtx) {
        let res = match self {
            MissionState::Initialize(_) | MissionState::Disabled(_) => Ok(()),
            MissionState::Drive(s) => s.exit(ctx),
            MissionState::Record(s) => s.exit(ctx),
        };

        if let Err(e) = res {
            error!("Error exiting {}: {}", self, e);
        }
    }
}

impl Display for MissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionState::Initialize(_) => write!(f, "MissionState::Initialize"),
            MissionState::Disabled(_) => write!(f, "MissionState::Disabled"),
            MissionState::Drive(_) => write!(f, "MissionState::Drive"),
            MissionState::Record(_) => write!(f, "MissionState::Record"),
        }
    }
}

#[cfg(test)]
mod test;
