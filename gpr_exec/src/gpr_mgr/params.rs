//! GprMgr parameters

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GprMgrParams {
    /// Sampling rate of the receiver ADC.
    ///
    /// Units: Hz
    pub sampling_rate_hz: f64,

    /// Fraction of the Nyquist frequency at which the intermediate frequency
    /// is placed.
    pub if_nyquist_fraction: f64,

    /// Maximum number of frequency steps in a sweep
    pub max_steps: usize,

    /// Maximum number of samples the receiver can capture per step
    pub max_samples_per_step: usize,

    /// Length of the transmit pulse.
    ///
    /// Units: microseconds
    pub pulse_width_us: u32,

    /// The sweep performed at each stop of the survey
    pub sweep: SweepConfig,
}

/// Configuration of a sweep.
#[derive(Debug, Copy, Clone, Deserialize)]
pub struct SweepConfig {
    /// Units: MHz
    pub start_freq_mhz: f64,

    /// Units: MHz
    pub stop_freq_mhz: f64,

    pub num_steps: usize,

    pub samples_per_step: usize,
}
