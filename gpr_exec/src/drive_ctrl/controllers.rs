//! # Drive controllers
//!
//! PID controller used for the wheel velocity loops and the heading hold.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
///
/// Time is passed in explicitly in milliseconds, so the integral and
/// derivative gains are scaled per millisecond.
#[derive(Debug, Serialize, Clone, Default)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// The integral accumulation
    integral: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// Time at which the previous error was passed in
    prev_time_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            integral: 0f64,
            prev_error: None,
            prev_time_ms: None
        }
    }

    /// Create a new controller from a `[k_p, k_i, k_d]` array.
    pub fn from_gains(gains: &[f64; 3]) -> Self {
        Self::new(gains[0], gains[1], gains[2])
    }

    /// Replace the gains, resetting the controller.
    pub fn set_gains(&mut self, k_p: f64, k_i: f64, k_d: f64) {
        self.k_p = k_p;
        self.k_i = k_i;
        self.k_d = k_d;
        self.reset();
    }

    /// Clear the controller's memory. The gains are preserved.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
        self.prev_time_ms = None;
    }

    /// The current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Get the output of the controller for the given target and
    /// measurement.
    pub fn get(&mut self, target: f64, measurement: f64, time_ms: u64) -> f64 {
        self.get_from_error(target - measurement, time_ms)
    }

    /// Get the output of the controller for a precomputed error, for
    /// example a wrapped angular error.
    pub fn get_from_error(&mut self, error: f64, time_ms: u64) -> f64 {
        // Time since the last run. With no previous run, or no time passed,
        // only the proportional term can be calculated.
        let history = match (self.prev_time_ms, self.prev_error) {
            (Some(t0), Some(e0)) if time_ms > t0 => Some(((time_ms - t0) as f64, e0)),
            _ => None
        };

        let (integ_term, deriv_term) = match history {
            Some((dt_ms, prev_error)) => {
                // Trapezoidal integration
                self.integral += 0.5 * (error + prev_error) * dt_ms;

                (
                    self.k_i * self.integral,
                    self.k_d * (error - prev_error) / dt_ms
                )
            },
            None => (0f64, 0f64)
        };

        // Remember the previous error and time
        self.prev_error = Some(error);
        self.prev_time_ms = Some(time_ms);

        self.k_p * error + integ_term + deriv_term
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_error_zero_output() {
        let mut pid = PidController::new(1.0, 0.5, 0.2);
        for t in 0..10 {
            assert_eq!(pid.get(3.0, 3.0, t * 10), 0.0);
        }
    }

    #[test]
    fn test_pid_terms() {
        let mut pid = PidController::new(2.0, 0.1, 1.0);

        // First call after creation: proportional only
        assert_eq!(pid.get(1.0, 0.0, 100), 2.0);

        // Second call 10 ms later with error 0.5:
        //  P = 1.0, I = 0.1 * (1.0 + 0.5) / 2 * 10 = 0.75, D = (0.5 - 1.0) / 10 = -0.05
        let out = pid.get(1.0, 0.5, 110);
        assert!((out - (1.0 + 0.75 - 0.05)).abs() < 1e-12);

        // No time passed, proportional only and integral untouched
        let integral = pid.integral();
        assert_eq!(pid.get(1.0, 0.5, 110), 1.0);
        assert_eq!(pid.integral(), integral);
    }

    #[test]
    fn test_reset_keeps_gains() {
        let mut pid = PidController::new(2.0, 1.0, 0.0);
        pid.get(1.0, 0.0, 0);
        pid.get(1.0, 0.0, 10);
        assert!(pid.integral() > 0.0);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);

        // After reset the first output is proportional only, with the same gain
        assert_eq!(pid.get(1.0, 0.0, 20), 2.0);

        pid.set_gains(3.0, 0.0, 0.0);
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.get(1.0, 0.0, 30), 3.0);
    }
}
