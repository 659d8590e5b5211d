//! Downlink of recorded sweeps

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::{gpr_mgr::SweepData, tm_link::TmLink};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sends recorded sweeps over the telemetry link, one radar message per step.
///
/// Sweeps are sent in the order they were recorded. A step is only left behind once its message
/// has been completely sent.
#[derive(Debug, Default)]
pub struct SweepDownlink {
    queue: VecDeque<SweepData>,

    /// Index of the next step of the front sweep to send
    step: usize,

    /// Set when the next radar send must start a fresh message
    restart: bool,

    num_sweeps_sent: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SweepDownlink {
    /// Queue a completed sweep for sending.
    pub fn queue(&mut self, sweep: SweepData) {
        if self.queue.is_empty() {
            self.step = 0;
            self.restart = true;
        }

        debug!(
            "Sweep with {} steps queued for downlink, {} already waiting",
            sweep.actual_num_steps,
            self.queue.len()
        );
        self.queue.push_back(sweep);
    }

    /// Number of sweeps not yet fully sent.
    pub fn num_pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of sweeps fully sent.
    pub fn num_sent(&self) -> usize {
        self.num_sweeps_sent
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Send as much of the pending sweeps as the link will take this cycle.
    pub fn service(&mut self, tm_link: &mut TmLink, time_ms: u64) {
        loop {
            let sweep = match self.queue.front() {
                Some(s) => s,
                None => return,
            };

            let num_steps = sweep
                .actual_num_steps
                .min(sweep.samples.len())
                .min(sweep.tx_freqs_mhz.len())
                .min(sweep.ref_freqs_mhz.len());

            if self.step >= num_steps {
                self.queue.pop_front();
                self.num_sweeps_sent += 1;
                self.step = 0;
                self.restart = true;
                info!("Sweep downlink complete ({} sent)", self.num_sweeps_sent);
                continue;
            }

            let res = tm_link.send_radar(
                sweep.tx_freqs_mhz[self.step],
                sweep.ref_freqs_mhz[self.step],
                &sweep.samples[self.step],
                self.restart,
                time_ms,
            );
            self.restart = false;

            match res {
                Ok(true) => self.step += 1,
                Ok(false) => return,
                Err(e) => {
                    warn!("Could not send step {} of the sweep, skipping it: {}", self.step, e);
                    self.step += 1;
                    self.restart = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        sim::{SimParams, SimWorld},
        tm_link::TmLinkParams,
    };
    use comms_if::tm::TmMessage;

    fn sweep(num_steps: usize) -> SweepData {
        SweepData {
            samples: vec![vec![1, 2, 3, 4]; num_steps],
            tx_freqs_mhz: (0..num_steps).map(|i| 1000.0 + i as f64).collect(),
            ref_freqs_mhz: (0..num_steps).map(|i| 999.4 + i as f64).collect(),
            actual_num_steps: num_steps,
            samples_per_step: 4,
        }
    }

    #[test]
    fn test_downlink() {
        let world = SimWorld::new(SimParams::default_test());
        let mut link = TmLink::new(
            TmLinkParams {
                bitrate_bps: 9600.0,
                queue_capacity_bytes: 40,
            },
            world.radio(),
        );

        let mut downlink = SweepDownlink::default();
        downlink.queue(sweep(3));
        downlink.queue(sweep(2));
        assert_eq!(downlink.num_pending(), 2);

        // Messages are 27 bytes, so some are split across cycles
        let mut time_ms = 0;
        while !downlink.is_idle() {
            downlink.service(&mut link, time_ms);
            time_ms += 100;
            assert!(time_ms < 10_000);
        }
        assert_eq!(downlink.num_sent(), 2);

        // Decode the stream, steps arrive in order
        let bytes = world.radio_bytes();
        let mut offset = 0;
        let mut freqs = Vec::new();
        while offset < bytes.len() {
            let (msg, len) = TmMessage::decode(&bytes[offset..]).unwrap();
            if let TmMessage::Radar(r) = msg {
                freqs.push(r.tx_freq_mhz);
                assert_eq!(r.samples, vec![1, 2, 3, 4]);
            }
            offset += len;
        }

        assert_eq!(freqs, vec![1000.0, 1001.0, 1002.0, 1000.0, 1001.0]);
    }
}
