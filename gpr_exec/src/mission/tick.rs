//! Cycle timing

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

use log::warn;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of mission cycles.
pub trait TickSource {
    /// Time since the source was created.
    ///
    /// Units: milliseconds
    fn now_ms(&self) -> u64;

    /// Block until the start of the next cycle.
    fn wait_for_next_cycle(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Tick source driven by the system clock.
///
/// Sleeps for whatever remains of the cycle period. Overruns are reported but not made up.
pub struct StdTickSource {
    period: Duration,
    start_instant: Instant,
    cycle_start_instant: Instant,
    num_consec_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StdTickSource {
    pub fn new(cycle_period_s: f64) -> Self {
        let now = Instant::now();

        Self {
            period: Duration::from_secs_f64(cycle_period_s.max(0.0)),
            start_instant: now,
            cycle_start_instant: now,
            num_consec_overruns: 0,
        }
    }

    /// Number of consecutive cycles which have overrun.
    pub fn num_consec_overruns(&self) -> u64 {
        self.num_consec_overruns
    }
}

impl TickSource for StdTickSource {
    fn now_ms(&self) -> u64 {
        self.start_instant.elapsed().as_millis() as u64
    }

    fn wait_for_next_cycle(&mut self) {
        let cycle_dur = self.cycle_start_instant.elapsed();

        match self.period.checked_sub(cycle_dur) {
            Some(d) => {
                self.num_consec_overruns = 0;
                thread::sleep(d);
            }
            None => {
                self.num_consec_overruns += 1;
                warn!(
                    "Cycle overran by {:.6} s",
                    cycle_dur.as_secs_f64() - self.period.as_secs_f64()
                );
            }
        }

        self.cycle_start_instant = Instant::now();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_std_tick_source() {
        let mut ticks = StdTickSource::new(0.01);

        ticks.wait_for_next_cycle();
        ticks.wait_for_next_cycle();

        assert!(ticks.now_ms() >= 20);
    }

    #[test]
    fn test_overrun() {
        let mut ticks = StdTickSource::new(0.001);

        thread::sleep(Duration::from_millis(5));
        ticks.wait_for_next_cycle();

        assert_eq!(ticks.num_consec_overruns(), 1);
    }
}
