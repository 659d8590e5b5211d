//! GprMgr state and sweep sequencing

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Serialize;

use comms_if::eqpt::gpr::{PulseTimer, SamplingReceiver, SignalSource};
use util::{
    archive::Archiver,
    session::Session,
};

use super::{GprMgrError, GprMgrParams, SweepConfig};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The radar equipment.
pub struct GprEqpt {
    /// Transmitter
    pub tx: Box<dyn SignalSource>,

    /// Local oscillator reference
    pub reference: Box<dyn SignalSource>,

    /// Transmit pulse timer
    pub timer: Box<dyn PulseTimer>,

    /// IF sampling receiver
    pub receiver: Box<dyn SamplingReceiver>,
}

/// The plan of the sweep being recorded.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct SweepPlan {
    pub start_freq_mhz: f64,
    pub stop_freq_mhz: f64,
    pub step_size_mhz: f64,
    pub num_steps: usize,
    pub samples_per_step: usize,

    /// Index of the step being recorded, equal to `num_steps` once complete
    pub current_step: usize,
}

/// Data recorded by a sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepData {
    /// Samples captured at each step
    pub samples: Vec<Vec<u32>>,

    /// Transmit frequency of each step.
    ///
    /// Units: MHz
    pub tx_freqs_mhz: Vec<f64>,

    /// Reference frequency of each step.
    ///
    /// Units: MHz
    pub ref_freqs_mhz: Vec<f64>,

    /// Number of steps for which data was captured
    pub actual_num_steps: usize,

    pub samples_per_step: usize,
}

/// Summary of one recorded step, for the archives.
#[derive(Debug, Serialize)]
struct StepRecord {
    sweep: usize,
    step: usize,
    tx_freq_mhz: f64,
    ref_freq_mhz: f64,
    num_samples: usize,
    mean: f64,
    peak: u32,
}

/// GPR manager.
pub struct GprMgr {
    params: GprMgrParams,

    eqpt: GprEqpt,

    plan: Option<SweepPlan>,

    data: SweepData,

    recording: bool,

    /// Number of sweeps started since initialisation
    num_sweeps: usize,

    arch_steps: Archiver,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GprMgr {
    pub fn new(params: GprMgrParams, eqpt: GprEqpt) -> Self {
        Self {
            params,
            eqpt,
            plan: None,
            data: SweepData::default(),
            recording: false,
            num_sweeps: 0,
            arch_steps: Archiver::default(),
        }
    }

    /// Create a new manager with parameters loaded from the given file.
    pub fn from_params_file(params_path: &str, eqpt: GprEqpt) -> Result<Self, GprMgrError> {
        let params = util::params::load(params_path).map_err(GprMgrError::ParamLoadError)?;
        Ok(Self::new(params, eqpt))
    }

    /// Bring up the radar equipment, and the archives if a session is given.
    pub fn init(&mut self, session: Option<&Session>) -> Result<(), GprMgrError> {
        self.eqpt.tx.init()?;
        self.eqpt.reference.init()?;
        self.eqpt.timer.init()?;
        self.eqpt.receiver.init()?;

        if let Some(s) = session {
            self.arch_steps = Archiver::from_path(s, "gpr_mgr/steps.csv")
                .map_err(|e| GprMgrError::ArchiveInitError(e.to_string()))?;
        }

        info!(
            "GprMgr initialised, IF = {:.4} MHz",
            self.target_if_mhz()
        );

        Ok(())
    }

    pub fn params(&self) -> &GprMgrParams {
        &self.params
    }

    /// The intermediate frequency between the transmitter and the reference.
    ///
    /// Units: MHz
    pub fn target_if_mhz(&self) -> f64 {
        self.params.sampling_rate_hz / 2.0 * self.params.if_nyquist_fraction / 1e6
    }

    /// Start recording a sweep.
    ///
    /// `num_steps` frequencies are used, evenly spaced from `start_freq_mhz` to `stop_freq_mhz`
    /// inclusive.
    pub fn start_recording(
        &mut self,
        start_freq_mhz: f64,
        stop_freq_mhz: f64,
        num_steps: usize,
        samples_per_step: usize,
    ) -> Result<(), GprMgrError> {
        if self.recording {
            return Err(GprMgrError::AlreadyRecording);
        }
        if num_steps == 0 || num_steps > self.params.max_steps {
            return Err(GprMgrError::InvalidNumSteps(num_steps, self.params.max_steps));
        }
        if samples_per_step == 0 || samples_per_step > self.params.max_samples_per_step {
            return Err(GprMgrError::InvalidNumSamples(
                samples_per_step,
                self.params.max_samples_per_step,
            ));
        }
        if !start_freq_mhz.is_finite()
            || !stop_freq_mhz.is_finite()
            || stop_freq_mhz < start_freq_mhz
            || start_freq_mhz - self.target_if_mhz() <= 0.0
        {
            return Err(GprMgrError::InvalidRange(start_freq_mhz, stop_freq_mhz));
        }

        let step_size_mhz = if num_steps > 1 {
            (stop_freq_mhz - start_freq_mhz) / (num_steps - 1) as f64
        }
        else {
            0.0
        };

        self.plan = Some(SweepPlan {
            start_freq_mhz,
            stop_freq_mhz,
            step_size_mhz,
            num_steps,
            samples_per_step,
            current_step: 0,
        });
        self.data = SweepData {
            samples: Vec::with_capacity(num_steps),
            tx_freqs_mhz: Vec::with_capacity(num_steps),
            ref_freqs_mhz: Vec::with_capacity(num_steps),
            actual_num_steps: 0,
            samples_per_step,
        };
        self.num_sweeps += 1;

        info!(
            "Starting sweep {}: {} steps from {} MHz to {} MHz, {} samples per step",
            self.num_sweeps, num_steps, start_freq_mhz, stop_freq_mhz, samples_per_step
        );

        if let Err(e) = self.start_step(0) {
            self.stop_sources();
            return Err(e);
        }
        self.recording = true;

        Ok(())
    }

    /// Start recording a sweep with the given configuration.
    pub fn start_sweep(&mut self, config: &SweepConfig) -> Result<(), GprMgrError> {
        self.start_recording(
            config.start_freq_mhz,
            config.stop_freq_mhz,
            config.num_steps,
            config.samples_per_step,
        )
    }

    /// Advance the sweep. Must be called every cycle while recording.
    ///
    /// Returns true while the sweep is still being recorded. An equipment error ends the sweep
    /// with both sources stopped, keeping the steps captured so far.
    pub fn proc(&mut self) -> Result<bool, GprMgrError> {
        if !self.recording {
            return Ok(false);
        }

        match self.advance() {
            Err(e) => {
                self.stop_sources();
                self.recording = false;
                warn!(
                    "Sweep {} stopped after {} steps: {}",
                    self.num_sweeps, self.data.actual_num_steps, e
                );
                Err(e)
            }
            res => res,
        }
    }

    fn advance(&mut self) -> Result<bool, GprMgrError> {
        // End of the transmit pulse
        if self.eqpt.timer.poll_elapsed() {
            self.eqpt.tx.stop()?;
        }

        let samples = match self.eqpt.receiver.poll_complete() {
            Some(s) => s,
            None => return Ok(true),
        };

        let if_mhz = self.target_if_mhz();

        let plan = match self.plan.as_mut() {
            Some(p) => p,
            None => {
                self.recording = false;
                return Ok(false);
            }
        };

        self.eqpt.reference.stop()?;

        let tx_freq_mhz = plan.start_freq_mhz + plan.current_step as f64 * plan.step_size_mhz;
        let ref_freq_mhz = tx_freq_mhz - if_mhz;

        if samples.len() != plan.samples_per_step {
            warn!(
                "Step {} returned {} samples, expected {}",
                plan.current_step,
                samples.len(),
                plan.samples_per_step
            );
        }

        let record = StepRecord {
            sweep: self.num_sweeps,
            step: plan.current_step,
            tx_freq_mhz,
            ref_freq_mhz,
            num_samples: samples.len(),
            mean: if samples.is_empty() {
                0.0
            }
            else {
                samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64
            },
            peak: samples.iter().copied().max().unwrap_or(0),
        };

        self.data.samples.push(samples);
        self.data.tx_freqs_mhz.push(tx_freq_mhz);
        self.data.ref_freqs_mhz.push(ref_freq_mhz);

        plan.current_step += 1;
        self.data.actual_num_steps = plan.current_step;

        let next_step = plan.current_step;
        let num_steps = plan.num_steps;

        if let Err(e) = self.arch_steps.serialise(record) {
            warn!("Could not archive GPR step: {}", e);
        }

        debug!("GPR step {}/{} recorded at {:.3} MHz", next_step, num_steps, tx_freq_mhz);

        if next_step < num_steps {
            self.start_step(next_step)?;
            Ok(true)
        }
        else {
            self.recording = false;
            info!("Sweep {} complete", self.num_sweeps);
            Ok(false)
        }
    }

    /// Get the data of the current or last sweep.
    ///
    /// The returned flag is true if the sweep is no longer being recorded, in which case the data
    /// is final.
    pub fn get_data(&self) -> (&SweepData, bool) {
        (&self.data, !self.recording)
    }

    /// The plan of the current or last sweep.
    pub fn plan(&self) -> Option<&SweepPlan> {
        self.plan.as_ref()
    }

    /// True if no sweep is being recorded.
    pub fn is_complete(&self) -> bool {
        !self.recording
    }

    /// Stop recording, keeping the data captured so far.
    pub fn abort(&mut self) {
        if !self.recording {
            return;
        }

        self.stop_sources();

        self.recording = false;
        warn!(
            "Sweep {} aborted after {} steps",
            self.num_sweeps, self.data.actual_num_steps
        );
    }

    /// Disable both sources, logging rather than returning any failure.
    fn stop_sources(&mut self) {
        for (name, res) in [
            ("transmitter", self.eqpt.tx.stop()),
            ("reference", self.eqpt.reference.stop()),
        ]
        .iter()
        {
            if let Err(e) = res {
                warn!("Could not stop the {}: {}", name, e);
            }
        }
    }

    fn start_step(&mut self, step: usize) -> Result<(), GprMgrError> {
        let plan = match self.plan {
            Some(p) => p,
            None => return Ok(()),
        };

        let tx_freq_mhz = plan.start_freq_mhz + step as f64 * plan.step_size_mhz;
        let ref_freq_mhz = tx_freq_mhz - self.target_if_mhz();

        self.eqpt.tx.set_output_frequency_mhz(tx_freq_mhz)?;
        self.eqpt.reference.set_output_frequency_mhz(ref_freq_mhz)?;
        self.eqpt.reference.start()?;
        self.eqpt.receiver.start_sampling(plan.samples_per_step)?;
        self.eqpt.tx.start()?;
        self.eqpt.timer.start_one_shot(self.params.pulse_width_us)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SignalRole, SimParams, SimPulseTimer, SimReceiver, SimSignalSource, SimWorld};
    use comms_if::eqpt::EqptError;
    use std::{cell::Cell, rc::Rc};

    /// A transmitter whose output fails to enable on the given start.
    struct FlakyTx {
        on: Rc<Cell<bool>>,
        num_starts: usize,
        fail_on_start: usize,
    }

    impl SignalSource for FlakyTx {
        fn init(&mut self) -> Result<(), EqptError> {
            Ok(())
        }

        fn set_output_frequency_mhz(&mut self, _freq_mhz: f64) -> Result<(), EqptError> {
            Ok(())
        }

        fn start(&mut self) -> Result<(), EqptError> {
            self.num_starts += 1;
            if self.num_starts == self.fail_on_start {
                return Err(EqptError::CommsFailed("transmitter", "no ack".into()));
            }
            self.on.set(true);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), EqptError> {
            self.on.set(false);
            Ok(())
        }
    }

    fn mgr_with_flaky_tx(fail_on_start: usize) -> (GprMgr, SimWorld, Rc<Cell<bool>>) {
        let world = SimWorld::new(SimParams::default_test());
        let tx_on = Rc::new(Cell::new(false));
        let eqpt = GprEqpt {
            tx: Box::new(FlakyTx {
                on: tx_on.clone(),
                num_starts: 0,
                fail_on_start,
            }),
            reference: Box::new(SimSignalSource::new(world.clone(), SignalRole::Reference)),
            timer: Box::new(SimPulseTimer::new(world.clone())),
            receiver: Box::new(SimReceiver::new(world.clone())),
        };
        let mut mgr = GprMgr::new(params(), eqpt);
        mgr.init(None).unwrap();
        (mgr, world, tx_on)
    }

    fn params() -> GprMgrParams {
        GprMgrParams {
            sampling_rate_hz: 1333333.33,
            if_nyquist_fraction: 0.9,
            max_steps: 50,
            max_samples_per_step: 1000,
            pulse_width_us: 1,
            sweep: SweepConfig {
                start_freq_mhz: 1000.0,
                stop_freq_mhz: 2000.0,
                num_steps: 5,
                samples_per_step: 100,
            },
        }
    }

    fn mgr() -> (GprMgr, SimWorld) {
        let world = SimWorld::new(SimParams::default_test());
        let mut mgr = GprMgr::new(params(), world.gpr_eqpt());
        mgr.init(None).unwrap();
        (mgr, world)
    }

    fn run_to_completion(mgr: &mut GprMgr) -> usize {
        let mut cycles = 0;
        while mgr.proc().unwrap() {
            cycles += 1;
            assert!(cycles < 1000, "sweep never completed");
        }
        cycles
    }

    #[test]
    fn test_sweep() {
        let (mut mgr, world) = mgr();

        assert!((mgr.target_if_mhz() - 0.6).abs() < 1e-6);

        mgr.start_recording(1000.0, 2000.0, 5, 100).unwrap();
        assert!(!mgr.is_complete());
        assert!(world.gpr_tx_on());
        assert!(world.gpr_ref_on());

        // Data is available but not final while recording
        let (_, inactive) = mgr.get_data();
        assert!(!inactive);

        run_to_completion(&mut mgr);

        assert!(mgr.is_complete());
        assert!(!world.gpr_tx_on());
        assert!(!world.gpr_ref_on());

        let (data, inactive) = mgr.get_data();
        assert!(inactive);
        assert_eq!(data.actual_num_steps, 5);
        assert_eq!(data.samples.len(), 5);
        assert!(data.samples.iter().all(|s| s.len() == 100));

        let expected = [1000.0, 1250.0, 1500.0, 1750.0, 2000.0];
        for (f, e) in data.tx_freqs_mhz.iter().zip(expected.iter()) {
            assert!((f - e).abs() < 1e-9);
        }
        for (r, t) in data.ref_freqs_mhz.iter().zip(data.tx_freqs_mhz.iter()) {
            assert!((t - r - mgr.target_if_mhz()).abs() < 1e-9);
        }

        // The transmitter was tuned to each step in turn
        assert_eq!(world.gpr_tx_freq_history().len(), 5);

        // A new sweep can be started once complete
        assert!(mgr.start_recording(1000.0, 1000.0, 1, 10).is_ok());
        run_to_completion(&mut mgr);
        assert_eq!(mgr.get_data().0.actual_num_steps, 1);
    }

    #[test]
    fn test_refused_starts() {
        let (mut mgr, _world) = mgr();

        assert!(matches!(
            mgr.start_recording(1000.0, 2000.0, 51, 100),
            Err(GprMgrError::InvalidNumSteps(51, 50))
        ));
        assert!(matches!(
            mgr.start_recording(1000.0, 2000.0, 0, 100),
            Err(GprMgrError::InvalidNumSteps(0, 50))
        ));
        assert!(matches!(
            mgr.start_recording(1000.0, 2000.0, 5, 1001),
            Err(GprMgrError::InvalidNumSamples(1001, 1000))
        ));
        assert!(matches!(
            mgr.start_recording(2000.0, 1000.0, 5, 100),
            Err(GprMgrError::InvalidRange(_, _))
        ));

        mgr.start_recording(1000.0, 2000.0, 5, 100).unwrap();
        assert!(matches!(
            mgr.start_recording(1000.0, 2000.0, 5, 100),
            Err(GprMgrError::AlreadyRecording)
        ));
    }

    #[test]
    fn test_abort() {
        let (mut mgr, world) = mgr();
        mgr.start_sweep(&params().sweep).unwrap();
        mgr.proc().unwrap();

        mgr.abort();
        assert!(mgr.is_complete());
        assert!(!world.gpr_tx_on());
        assert!(!world.gpr_ref_on());
        assert!(mgr.get_data().0.actual_num_steps < 5);
        assert!(!mgr.proc().unwrap());
    }

    #[test]
    fn test_failed_start_stops_sources() {
        let (mut mgr, world, tx_on) = mgr_with_flaky_tx(1);

        assert!(mgr.start_recording(1000.0, 2000.0, 5, 100).is_err());
        assert!(mgr.is_complete());
        assert!(!world.gpr_ref_on());
        assert!(!tx_on.get());
        assert!(!mgr.proc().unwrap());

        // Nothing is left stuck, so the next attempt records normally
        mgr.start_recording(1000.0, 2000.0, 5, 100).unwrap();
        run_to_completion(&mut mgr);
        assert_eq!(mgr.get_data().0.actual_num_steps, 5);
    }

    #[test]
    fn test_failed_step_stops_sources() {
        let (mut mgr, world, tx_on) = mgr_with_flaky_tx(2);
        mgr.start_recording(1000.0, 2000.0, 5, 100).unwrap();

        let mut cycles = 0;
        loop {
            match mgr.proc() {
                Ok(true) => (),
                Ok(false) => panic!("sweep completed despite the failed step"),
                Err(GprMgrError::EqptError(_)) => break,
                Err(e) => panic!("Unexpected error {}", e),
            }
            cycles += 1;
            assert!(cycles < 1000, "step never failed");
        }

        assert!(mgr.is_complete());
        assert!(!world.gpr_ref_on());
        assert!(!tx_on.get());

        let (data, inactive) = mgr.get_data();
        assert!(inactive);
        assert_eq!(data.actual_num_steps, 1);
        assert!(!mgr.proc().unwrap());
    }
}
