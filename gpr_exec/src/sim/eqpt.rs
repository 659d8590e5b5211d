//! Simulated equipment

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;

use comms_if::eqpt::{
    drive::{DriveActuator, EncoderTicks, Side, WheelOdometry},
    gpr::{PulseTimer, SamplingReceiver, SignalSource},
    gps::PositionFixSource,
    imu::{Imu, ImuReading},
    monitor::{batt_adc_to_voltage, batt_voltage_to_adc, BatteryMonitor, EnableSwitch},
    radio::SerialTransport,
    EqptError,
};

use super::SimWorld;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Mid-scale value of the simulated receiver ADC.
const ADC_MID_SCALE: f64 = 2048.0;

/// Amplitude of the simulated IF signal, in ADC counts.
const IF_AMPLITUDE: f64 = 1000.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct SimDriveActuator {
    world: SimWorld,
}

pub struct SimOdometer {
    world: SimWorld,
    side: Side,
}

pub struct SimImu {
    world: SimWorld,
}

pub struct SimGps {
    world: SimWorld,
}

pub struct SimSignalSource {
    world: SimWorld,
    role: SignalRole,
}

pub struct SimPulseTimer {
    world: SimWorld,
}

pub struct SimReceiver {
    world: SimWorld,
}

pub struct SimBatteryMonitor {
    world: SimWorld,
}

pub struct SimEnableSwitch {
    world: SimWorld,
}

pub struct SimRadio {
    world: SimWorld,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The role of a simulated signal source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SignalRole {
    Transmitter,
    Reference,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

/// Fail initialisation if the world is set to.
fn sim_init(world: &SimWorld, name: &'static str) -> Result<(), EqptError> {
    if world.borrow_mut().fail_init {
        Err(EqptError::InitFailed(name, "simulated failure".into()))
    }
    else {
        Ok(())
    }
}

impl SimDriveActuator {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl DriveActuator for SimDriveActuator {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "drive actuator")
    }

    fn set_percentage(&mut self, side: Side, pct: f64) -> Result<(), EqptError> {
        if !pct.is_finite() || pct.abs() > 100.0 {
            return Err(EqptError::InvalidDemand(
                "drive actuator",
                format!("{} % on the {:?} side", pct, side),
            ));
        }

        let mut w = self.world.borrow_mut();
        match side {
            Side::Left => w.duty_pct[0] = pct,
            Side::Right => w.duty_pct[1] = pct,
        }

        Ok(())
    }
}

impl SimOdometer {
    pub fn new(world: SimWorld, side: Side) -> Self {
        Self { world, side }
    }

    fn index(&self) -> usize {
        match self.side {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl WheelOdometry for SimOdometer {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "odometer")
    }

    fn start(&mut self) -> Result<(), EqptError> {
        let i = self.index();
        let mut w = self.world.borrow_mut();
        if let Some(frozen) = w.odo_frozen_m[i].take() {
            // Resume counting from the frozen value
            w.odo_zero_m[i] = w.wheel_dist(self.side) - frozen;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EqptError> {
        let i = self.index();
        let mut w = self.world.borrow_mut();
        if w.odo_frozen_m[i].is_none() {
            w.odo_frozen_m[i] = Some(w.wheel_dist(self.side) - w.odo_zero_m[i]);
        }
        Ok(())
    }

    fn zero(&mut self) -> Result<(), EqptError> {
        let i = self.index();
        let mut w = self.world.borrow_mut();
        w.odo_zero_m[i] = w.wheel_dist(self.side);
        if w.odo_frozen_m[i].is_some() {
            w.odo_frozen_m[i] = Some(0.0);
        }
        Ok(())
    }

    fn get_ticks(&mut self) -> Result<EncoderTicks, EqptError> {
        let i = self.index();
        let w = self.world.borrow_mut();
        let dist_m = match w.odo_frozen_m[i] {
            Some(d) => d,
            None => w.wheel_dist(self.side) - w.odo_zero_m[i],
        };

        Ok(EncoderTicks::from_total(
            (dist_m * w.params.ticks_per_m).round() as i64,
        ))
    }
}

impl SimImu {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl Imu for SimImu {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "IMU")
    }

    fn get_reading(&mut self) -> Result<ImuReading, EqptError> {
        let yaw = self.world.borrow_mut().pose.theta();
        let half = 0.5 * yaw;

        Ok(ImuReading {
            euler_rad: [0.0, 0.0, yaw],
            quaternion: [half.cos(), 0.0, 0.0, half.sin()],
            linear_accel_ms2: [0.0; 3],
        })
    }
}

impl SimGps {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl PositionFixSource for SimGps {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "GPS")
    }

    fn start_receive(&mut self) -> Result<(), EqptError> {
        self.world.borrow_mut().gps_receiving = true;
        Ok(())
    }

    fn poll_sentence(&mut self) -> Option<String> {
        let mut w = self.world.borrow_mut();
        if !w.gps_receiving {
            return None;
        }

        let sentence = w.gps_queue.pop_front()?;
        w.gps_receiving = false;
        Some(sentence)
    }
}

impl SimSignalSource {
    pub fn new(world: SimWorld, role: SignalRole) -> Self {
        Self { world, role }
    }
}

impl SignalSource for SimSignalSource {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "signal source")
    }

    fn set_output_frequency_mhz(&mut self, freq_mhz: f64) -> Result<(), EqptError> {
        if !(freq_mhz > 0.0) {
            return Err(EqptError::InvalidDemand(
                "signal source",
                format!("{} MHz", freq_mhz),
            ));
        }

        let mut w = self.world.borrow_mut();
        match self.role {
            SignalRole::Transmitter => {
                w.gpr_tx_freq_mhz = freq_mhz;
                w.gpr_tx_freq_history.push(freq_mhz);
            }
            SignalRole::Reference => w.gpr_ref_freq_mhz = freq_mhz,
        }

        Ok(())
    }

    fn start(&mut self) -> Result<(), EqptError> {
        let mut w = self.world.borrow_mut();
        match self.role {
            SignalRole::Transmitter => w.gpr_tx_on = true,
            SignalRole::Reference => w.gpr_ref_on = true,
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EqptError> {
        let mut w = self.world.borrow_mut();
        match self.role {
            SignalRole::Transmitter => w.gpr_tx_on = false,
            SignalRole::Reference => w.gpr_ref_on = false,
        }
        Ok(())
    }
}

impl SimPulseTimer {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl PulseTimer for SimPulseTimer {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "pulse timer")
    }

    fn start_one_shot(&mut self, _duration_us: u32) -> Result<(), EqptError> {
        self.world.borrow_mut().gpr_timer_armed = true;
        Ok(())
    }

    /// Pulses are far shorter than a cycle, so the timer has always elapsed by the next poll.
    fn poll_elapsed(&mut self) -> bool {
        let mut w = self.world.borrow_mut();
        let elapsed = w.gpr_timer_armed;
        w.gpr_timer_armed = false;
        elapsed
    }
}

impl SimReceiver {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl SamplingReceiver for SimReceiver {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "receiver")
    }

    fn start_sampling(&mut self, num_samples: usize) -> Result<(), EqptError> {
        let mut w = self.world.borrow_mut();
        let polls = w.params.gpr_sampling_polls;
        w.gpr_sampling = Some((polls, num_samples));
        Ok(())
    }

    fn poll_complete(&mut self) -> Option<Vec<u32>> {
        let mut w = self.world.borrow_mut();
        let (polls, num_samples) = w.gpr_sampling?;

        if polls > 1 {
            w.gpr_sampling = Some((polls - 1, num_samples));
            return None;
        }
        w.gpr_sampling = None;

        // No IF without both sources running
        let amplitude = if w.gpr_ref_on { IF_AMPLITUDE } else { 0.0 };

        // The IF sits just below Nyquist, so it advances nearly pi per sample. The phase depends
        // on the step frequency so that each step looks different.
        let phase = w.gpr_tx_freq_mhz.to_radians();
        let samples = (0..num_samples)
            .map(|i| {
                let s = ADC_MID_SCALE + amplitude * (0.9 * PI * i as f64 + phase).sin();
                s.round().max(0.0) as u32
            })
            .collect();

        Some(samples)
    }
}

impl SimBatteryMonitor {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl BatteryMonitor for SimBatteryMonitor {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "battery monitor")
    }

    fn start_read(&mut self) -> Result<(), EqptError> {
        self.world.borrow_mut().battery_read_pending = true;
        Ok(())
    }

    fn poll_voltage(&mut self) -> Option<f64> {
        let mut w = self.world.borrow_mut();
        if !w.battery_read_pending {
            return None;
        }
        w.battery_read_pending = false;

        // Quantise through the ADC
        Some(batt_adc_to_voltage(batt_voltage_to_adc(w.battery_v)))
    }
}

impl SimEnableSwitch {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl EnableSwitch for SimEnableSwitch {
    fn is_pressed(&mut self) -> bool {
        self.world.borrow_mut().switch_pressed
    }
}

impl SimRadio {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl SerialTransport for SimRadio {
    fn init(&mut self) -> Result<(), EqptError> {
        sim_init(&self.world, "radio")
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), EqptError> {
        self.world.borrow_mut().radio_bytes.extend_from_slice(bytes);
        Ok(())
    }
}
