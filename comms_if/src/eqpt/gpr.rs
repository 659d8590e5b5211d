//! # Radar equipment
//!
//! The stepped-frequency radar is made up of two synthesised signal sources (the transmitter and
//! the local-oscillator reference), a one-shot timer gating the transmit pulse, and an ADC
//! sampling the intermediate frequency produced by mixing the two.

use super::EqptError;

/// A synthesised RF signal source.
pub trait SignalSource {
    /// Bring up the source, leaving its output disabled.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Program the output frequency.
    ///
    /// Units: MHz
    fn set_output_frequency_mhz(&mut self, freq_mhz: f64) -> Result<(), EqptError>;

    /// Enable the output.
    fn start(&mut self) -> Result<(), EqptError>;

    /// Disable the output.
    fn stop(&mut self) -> Result<(), EqptError>;
}

/// A one-shot timer used to bound the length of the transmit pulse.
pub trait PulseTimer {
    /// Bring up the timer.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Arm the timer to elapse once after the given duration.
    fn start_one_shot(&mut self, duration_us: u32) -> Result<(), EqptError>;

    /// Returns true once after the armed duration has elapsed.
    fn poll_elapsed(&mut self) -> bool;
}

/// A sampling receiver which captures a fixed number of samples into a buffer.
pub trait SamplingReceiver {
    /// Bring up the receiver.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Start capturing `num_samples` samples.
    fn start_sampling(&mut self, num_samples: usize) -> Result<(), EqptError>;

    /// Take the captured samples once the capture is complete.
    fn poll_complete(&mut self) -> Option<Vec<u32>>;
}
