//! # Localisation manager
//!
//! Owns the localisation sensors, polls them once per cycle and integrates their data into an
//! [`Estimate`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, trace, warn};

use comms_if::eqpt::{
    drive::{EncoderTicks, WheelOdometry},
    gps::{GpsFix, PositionFixSource},
    imu::{Imu, ImuReading},
};
use util::{maths::ang_dist, time::ms_diff_to_seconds};

use super::{Estimate, LocError, LocMgrParams, Pose2D};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of localisation sensors.
pub const NUM_SENSORS: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The localisation equipment.
pub struct LocEqpt {
    pub left_odo: Box<dyn WheelOdometry>,
    pub right_odo: Box<dyn WheelOdometry>,
    pub imu: Box<dyn Imu>,
    pub gps: Box<dyn PositionFixSource>,
}

/// The latest data from one sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorReading {
    /// If false the sensor is not read during polling.
    pub enabled: bool,

    /// True if `data` was updated during the last poll.
    pub updated: bool,

    /// The most recent data from the sensor, if any has been received.
    pub data: Option<SensorData>,
}

/// Localisation manager.
pub struct LocMgr {
    params: LocMgrParams,

    eqpt: LocEqpt,

    readings: [SensorReading; NUM_SENSORS],

    /// Encoder totals used in the last integration step, [left, right].
    last_ticks: Option<[i64; 2]>,

    /// IMU yaw at the time the first IMU reading was received, used to align the IMU to the
    /// initial heading.
    imu_yaw_offset_rad: Option<f64>,

    last_time_ms: Option<u64>,

    estimate: Estimate,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The localisation sensors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SensorKind {
    LeftEncoder = 0,
    RightEncoder = 1,
    Imu = 2,
    Gps = 3,
}

/// Data from a localisation sensor.
#[derive(Debug, Clone)]
pub enum SensorData {
    Encoder(EncoderTicks),
    Imu(ImuReading),
    Gps(GpsFix),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocMgr {
    /// Create a new manager, with all sensors disabled.
    pub fn new(params: LocMgrParams, eqpt: LocEqpt) -> Self {
        let initial = Pose2D::new(
            params.initial_pose[0],
            params.initial_pose[1],
            params.initial_pose[2],
        );

        Self {
            params,
            eqpt,
            readings: Default::default(),
            last_ticks: None,
            imu_yaw_offset_rad: None,
            last_time_ms: None,
            estimate: Estimate::at_rest(initial),
        }
    }

    /// Create a new manager with parameters loaded from the given file.
    pub fn from_params_file(params_path: &str, eqpt: LocEqpt) -> Result<Self, LocError> {
        let params = util::params::load(params_path).map_err(LocError::ParamLoadError)?;
        Ok(Self::new(params, eqpt))
    }

    /// Bring up all localisation equipment.
    pub fn init(&mut self) -> Result<(), LocError> {
        self.eqpt.left_odo.init()?;
        self.eqpt.right_odo.init()?;
        self.eqpt.imu.init()?;
        self.eqpt.gps.init()?;

        info!("LocMgr equipment initialised");

        Ok(())
    }

    /// Enable a sensor so it is read during polling.
    pub fn enable(&mut self, kind: SensorKind) -> Result<(), LocError> {
        match kind {
            SensorKind::LeftEncoder => {
                self.eqpt.left_odo.zero()?;
                self.eqpt.left_odo.start()?;
                self.last_ticks = None;
            }
            SensorKind::RightEncoder => {
                self.eqpt.right_odo.zero()?;
                self.eqpt.right_odo.start()?;
                self.last_ticks = None;
            }
            SensorKind::Imu => (),
            SensorKind::Gps => self.eqpt.gps.start_receive()?,
        }

        self.readings[kind as usize].enabled = true;
        debug!("{:?} enabled", kind);

        Ok(())
    }

    /// Disable a sensor, its last data is retained.
    pub fn disable(&mut self, kind: SensorKind) -> Result<(), LocError> {
        match kind {
            SensorKind::LeftEncoder => self.eqpt.left_odo.stop()?,
            SensorKind::RightEncoder => self.eqpt.right_odo.stop()?,
            _ => (),
        }

        self.readings[kind as usize].enabled = false;
        self.readings[kind as usize].updated = false;
        debug!("{:?} disabled", kind);

        Ok(())
    }

    /// Get the reading of a sensor.
    pub fn reading(&self, kind: SensorKind) -> &SensorReading {
        &self.readings[kind as usize]
    }

    /// Read all enabled sensors.
    ///
    /// All updated flags are cleared first, so after this call a flag is only set if that sensor
    /// produced new data during this poll.
    pub fn poll(&mut self) {
        for r in self.readings.iter_mut() {
            r.updated = false;
        }

        if self.readings[SensorKind::LeftEncoder as usize].enabled {
            let res = self.eqpt.left_odo.get_ticks();
            Self::store(&mut self.readings, SensorKind::LeftEncoder, res.map(SensorData::Encoder));
        }

        if self.readings[SensorKind::RightEncoder as usize].enabled {
            let res = self.eqpt.right_odo.get_ticks();
            Self::store(&mut self.readings, SensorKind::RightEncoder, res.map(SensorData::Encoder));
        }

        if self.readings[SensorKind::Imu as usize].enabled {
            let res = self.eqpt.imu.get_reading();
            Self::store(&mut self.readings, SensorKind::Imu, res.map(SensorData::Imu));
        }

        if self.readings[SensorKind::Gps as usize].enabled {
            if let Some(sentence) = self.eqpt.gps.poll_sentence() {
                match sentence.parse::<GpsFix>() {
                    Ok(fix) if fix.is_valid() => {
                        let r = &mut self.readings[SensorKind::Gps as usize];
                        r.data = Some(SensorData::Gps(fix));
                        r.updated = true;
                    }
                    Ok(_) => debug!("GPS reports no fix, sentence discarded"),
                    Err(e) => debug!("Discarding GPS sentence {:?}: {}", sentence, e),
                }

                // Restart reception for the next sentence
                if let Err(e) = self.eqpt.gps.start_receive() {
                    warn!("Could not restart GPS reception: {}", e);
                }
            }
        }
    }

    /// Poll the sensors and update the estimate.
    pub fn update_estimates(&mut self, time_ms: u64) -> Estimate {
        self.poll();

        let dt_s = match self.last_time_ms {
            Some(t) => ms_diff_to_seconds(t, time_ms),
            None => 0.0,
        };
        self.last_time_ms = Some(time_ms);

        let prev_pose = self.estimate.pose;
        let mut pose = prev_pose;
        let mut dist_m = 0.0;

        // Dead reckoning from the encoders
        if let (Some(l), Some(r)) = (
            self.encoder_total(SensorKind::LeftEncoder),
            self.encoder_total(SensorKind::RightEncoder),
        ) {
            if let Some([last_l, last_r]) = self.last_ticks {
                let d_left_m = (l - last_l) as f64 / self.params.ticks_per_m;
                let d_right_m = (r - last_r) as f64 / self.params.ticks_per_m;

                dist_m = 0.5 * (d_left_m + d_right_m);
                let d_theta = (d_right_m - d_left_m) / self.params.wheel_base_m;

                let mid_theta = pose.theta() + 0.5 * d_theta;
                pose.position_m[0] += dist_m * mid_theta.cos();
                pose.position_m[1] += dist_m * mid_theta.sin();
                pose.set_theta(pose.theta() + d_theta);
            }
            self.last_ticks = Some([l, r]);
        }

        // Heading from the IMU
        if self.params.use_imu_heading {
            let r = &self.readings[SensorKind::Imu as usize];
            if let (true, Some(SensorData::Imu(reading))) = (r.updated, &r.data) {
                let yaw = reading.yaw_rad();
                let offset = *self
                    .imu_yaw_offset_rad
                    .get_or_insert(yaw - self.params.initial_pose[2]);
                pose.set_theta(yaw - offset);
            }
        }

        if dt_s > 0.0 {
            self.estimate.forward_vel_ms = dist_m / dt_s;
            self.estimate.yaw_rate_rads = ang_dist(prev_pose.theta(), pose.theta()) / dt_s;
        }
        self.estimate.pose = pose;

        trace!(
            "Estimate: ({:.3}, {:.3}, {:.3}) v = {:.3} m/s, w = {:.3} rad/s",
            pose.x(),
            pose.y(),
            pose.theta(),
            self.estimate.forward_vel_ms,
            self.estimate.yaw_rate_rads
        );

        self.estimate
    }

    /// The current estimate.
    pub fn estimate(&self) -> Estimate {
        self.estimate
    }

    /// The current estimate flattened to a planar pose.
    pub fn estimate_to_pose2d(&self) -> Pose2D {
        self.estimate.pose
    }

    /// The most recent valid GPS fix.
    pub fn latest_fix(&self) -> Option<&GpsFix> {
        match self.readings[SensorKind::Gps as usize].data {
            Some(SensorData::Gps(ref f)) => Some(f),
            _ => None,
        }
    }

    /// The most recent IMU reading.
    pub fn latest_imu(&self) -> Option<&ImuReading> {
        match self.readings[SensorKind::Imu as usize].data {
            Some(SensorData::Imu(ref i)) => Some(i),
            _ => None,
        }
    }

    fn encoder_total(&self, kind: SensorKind) -> Option<i64> {
        match self.readings[kind as usize].data {
            Some(SensorData::Encoder(t)) => Some(t.total()),
            _ => None,
        }
    }

    fn store<E: std::fmt::Display>(
        readings: &mut [SensorReading; NUM_SENSORS],
        kind: SensorKind,
        res: Result<SensorData, E>,
    ) {
        match res {
            Ok(d) => {
                let r = &mut readings[kind as usize];
                r.data = Some(d);
                r.updated = true;
            }
            Err(e) => warn!("Could not read {:?}, keeping previous data: {}", kind, e),
        }
    }
}
