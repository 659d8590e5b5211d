//! # Telemetry link module
//!
//! Packs telemetry into [`comms_if::tm::TmMessage`]s and hands them to the radio without ever
//! overfilling its transmit buffer.
//!
//! The radio gives no feedback on how full its buffer is, so the link keeps an estimate: every
//! byte handed over adds to the occupancy, and the occupancy drains at the link bitrate. Poses
//! and monitoring messages are small and are either sent whole or refused. Radar steps can be
//! larger than the whole buffer, so they are sent in chunks over several cycles. While a radar
//! message is part sent every other message is refused, so frames never interleave on the wire.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, trace};

use comms_if::{
    eqpt::{radio::SerialTransport, EqptError},
    tm::{MonitoringTm, PoseTm, RadarTm, TmError, TmMessage, RADAR_MAX_SAMPLES},
};
use util::time::ms_diff_to_seconds;

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

pub use params::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The outgoing telemetry link.
pub struct TmLink {
    params: TmLinkParams,

    transport: Box<dyn SerialTransport>,

    /// Estimated number of bytes waiting in the radio's buffer
    occupancy_bytes: f64,

    /// Time of the last occupancy update
    last_update_ms: Option<u64>,

    /// Number of bytes of the current radar message already handed to the radio
    radar_cursor: usize,

    /// Total bytes handed to the radio
    bytes_sent: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmLinkError {
    #[error("Failed to load TmLink parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not encode the telemetry: {0}")]
    EncodeError(#[from] TmError),

    #[error("Radio error: {0}")]
    TransportError(#[from] EqptError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmLink {
    pub fn new(params: TmLinkParams, transport: Box<dyn SerialTransport>) -> Self {
        Self {
            params,
            transport,
            occupancy_bytes: 0.0,
            last_update_ms: None,
            radar_cursor: 0,
            bytes_sent: 0,
        }
    }

    /// Create a new link with parameters loaded from the given file.
    pub fn from_params_file(
        params_path: &str,
        transport: Box<dyn SerialTransport>,
    ) -> Result<Self, TmLinkError> {
        let params = util::params::load(params_path).map_err(TmLinkError::ParamLoadError)?;
        Ok(Self::new(params, transport))
    }

    pub fn init(&mut self) -> Result<(), TmLinkError> {
        self.transport.init()?;

        info!(
            "TmLink initialised at {} bps with a {} byte buffer",
            self.params.bitrate_bps, self.params.queue_capacity_bytes
        );

        Ok(())
    }

    /// Current estimate of the radio buffer occupancy.
    ///
    /// Units: bytes
    pub fn occupancy_bytes(&self) -> f64 {
        self.occupancy_bytes
    }

    /// Total number of bytes handed to the radio since creation.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// `true` while a radar message has been partly handed to the radio.
    pub fn radar_in_progress(&self) -> bool {
        self.radar_cursor != 0
    }

    /// Send the pose relative to the start of the survey.
    ///
    /// Returns `Ok(false)` if the message does not fit in the radio buffer.
    pub fn send_relative_pose(&mut self, pose: PoseTm, time_ms: u64) -> Result<bool, TmLinkError> {
        self.send_whole(&TmMessage::RelativePose(pose), time_ms)
    }

    /// Send the absolute (GPS) pose.
    ///
    /// Returns `Ok(false)` if the message does not fit in the radio buffer.
    pub fn send_absolute_pose(&mut self, pose: PoseTm, time_ms: u64) -> Result<bool, TmLinkError> {
        self.send_whole(&TmMessage::AbsolutePose(pose), time_ms)
    }

    /// Send system health telemetry.
    ///
    /// Returns `Ok(false)` if the message does not fit in the radio buffer.
    pub fn send_monitoring(
        &mut self,
        battery_v: f64,
        time_ms: u64,
    ) -> Result<bool, TmLinkError> {
        self.send_whole(
            &TmMessage::Monitoring(MonitoringTm {
                battery_v: battery_v as f32,
            }),
            time_ms,
        )
    }

    /// Send one radar step, in as many calls as it takes.
    ///
    /// Each call hands as many of the remaining bytes to the radio as currently fit. Returns
    /// `Ok(true)` once the whole message has been sent, after which the next call starts a new
    /// message. If `restart` is set any partially sent message is abandoned and sending starts
    /// again from the first byte.
    pub fn send_radar(
        &mut self,
        tx_freq_mhz: f64,
        ref_freq_mhz: f64,
        samples: &[u32],
        restart: bool,
        time_ms: u64,
    ) -> Result<bool, TmLinkError> {
        if restart {
            self.radar_cursor = 0;
        }

        if samples.len() > RADAR_MAX_SAMPLES {
            return Err(TmError::PayloadTooLong(samples.len()).into());
        }

        let bytes = TmMessage::Radar(RadarTm {
            tx_freq_mhz: tx_freq_mhz as f32,
            ref_freq_mhz: ref_freq_mhz as f32,
            samples: samples.to_vec(),
        })
        .encode()?;

        // The data changed length under a partial send
        if self.radar_cursor > bytes.len() {
            self.radar_cursor = 0;
        }

        self.drain(time_ms);

        let remaining = bytes.len() - self.radar_cursor;
        let chunk_len = remaining.min(self.free_bytes());

        if chunk_len > 0 {
            let end = self.radar_cursor + chunk_len;
            if let Err(e) = self.transmit(&bytes[self.radar_cursor..end]) {
                // The frame is lost, don't block whole messages behind it
                self.radar_cursor = 0;
                return Err(e);
            }
            self.radar_cursor = end;
        }

        trace!(
            "Radar TM {}/{} bytes sent, occupancy {:.1}",
            self.radar_cursor,
            bytes.len(),
            self.occupancy_bytes
        );

        if self.radar_cursor == bytes.len() {
            self.radar_cursor = 0;
            Ok(true)
        }
        else {
            Ok(false)
        }
    }

    fn send_whole(&mut self, msg: &TmMessage, time_ms: u64) -> Result<bool, TmLinkError> {
        self.drain(time_ms);

        if self.radar_in_progress() {
            debug!(
                "{:?} TM refused, radar TM {} bytes in",
                msg.kind(),
                self.radar_cursor
            );
            return Ok(false);
        }

        let bytes = msg.encode()?;

        if bytes.len() > self.free_bytes() {
            debug!(
                "{:?} TM refused, {} bytes with occupancy {:.1}/{}",
                msg.kind(),
                bytes.len(),
                self.occupancy_bytes,
                self.params.queue_capacity_bytes
            );
            return Ok(false);
        }

        self.transmit(&bytes)?;

        Ok(true)
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), TmLinkError> {
        self.transport.transmit(bytes)?;
        self.occupancy_bytes += bytes.len() as f64;
        self.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    /// Drain the occupancy estimate by the bytes sent over the air since the last update.
    fn drain(&mut self, time_ms: u64) {
        if let Some(last_ms) = self.last_update_ms {
            let elapsed_s = ms_diff_to_seconds(last_ms, time_ms);
            self.occupancy_bytes =
                (self.occupancy_bytes - self.params.bitrate_bps / 8.0 * elapsed_s).max(0.0);
        }

        self.last_update_ms = Some(time_ms);
    }

    /// Whole number of bytes which can be handed to the radio now.
    fn free_bytes(&self) -> usize {
        let free = self.params.queue_capacity_bytes as f64 - self.occupancy_bytes;

        if free <= 0.0 {
            0
        }
        else {
            free.floor() as usize
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimParams, SimWorld};
    use comms_if::tm::{TmKind, HEADER_LEN, POSE_PAYLOAD_LEN, RADAR_PAYLOAD_FIXED_LEN};

    fn link(capacity: usize) -> (TmLink, SimWorld) {
        let world = SimWorld::new(SimParams::default_test());
        let mut link = TmLink::new(
            TmLinkParams {
                bitrate_bps: 9600.0,
                queue_capacity_bytes: capacity,
            },
            world.radio(),
        );
        link.init().unwrap();
        (link, world)
    }

    #[test]
    fn test_refusal_keeps_occupancy() {
        let (mut link, world) = link(50);
        let pose_len = (HEADER_LEN + POSE_PAYLOAD_LEN) as f64;

        assert!(link.send_relative_pose(PoseTm::default(), 0).unwrap());
        assert_eq!(link.occupancy_bytes(), pose_len);

        // No time has passed so the second pose cannot fit
        assert!(!link.send_absolute_pose(PoseTm::default(), 0).unwrap());
        assert_eq!(link.occupancy_bytes(), pose_len);
        assert_eq!(world.radio_bytes().len(), pose_len as usize);

        // The monitoring message is small enough to still fit
        assert!(link.send_monitoring(12.5, 0).unwrap());
    }

    #[test]
    fn test_drain() {
        let (mut link, _world) = link(50);

        assert!(link.send_relative_pose(PoseTm::default(), 0).unwrap());
        assert!(!link.send_relative_pose(PoseTm::default(), 0).unwrap());

        // 1200 bytes/s, so 10 ms drains 12 bytes, leaving 15 of 27
        assert!(link.send_relative_pose(PoseTm::default(), 10).unwrap());
        assert!((link.occupancy_bytes() - 42.0).abs() < 1e-9);

        // Long after, everything has drained
        assert!(link.send_monitoring(12.0, 10_000).unwrap());
        assert!((link.occupancy_bytes() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_chunked_radar() {
        let (mut link, world) = link(64);
        let samples: Vec<u32> = (0..20).map(|i| i * 1000).collect();
        let total = HEADER_LEN + RADAR_PAYLOAD_FIXED_LEN + 4 * samples.len();

        // First chunk fills the buffer
        assert!(!link.send_radar(1000.0, 999.4, &samples, false, 0).unwrap());
        assert_eq!(world.radio_bytes().len(), 64);

        // Nothing fits without time passing
        assert!(!link.send_radar(1000.0, 999.4, &samples, false, 0).unwrap());
        assert_eq!(world.radio_bytes().len(), 64);

        // Fully drained, the remainder goes out
        assert!(link.send_radar(1000.0, 999.4, &samples, false, 1000).unwrap());

        let sent = world.radio_bytes();
        assert_eq!(sent.len(), total);

        let (msg, len) = TmMessage::decode(&sent).unwrap();
        assert_eq!(len, total);
        match msg {
            TmMessage::Radar(r) => {
                assert_eq!(r.samples, samples);
                assert_eq!(r.tx_freq_mhz, 1000.0);
            }
            m => panic!("Unexpected message {:?}", m),
        }

        // The next call starts a new message
        assert!(link.send_radar(1000.0, 999.4, &samples[..2], false, 2000).unwrap());
        assert_eq!(world.radio_bytes().len(), total + HEADER_LEN + RADAR_PAYLOAD_FIXED_LEN + 8);
    }

    #[test]
    fn test_no_interleaving_with_radar() {
        let (mut link, world) = link(64);
        let samples: Vec<u32> = (0..40).collect();
        let mut time_ms = 0;

        assert!(!link.send_radar(1000.0, 999.4, &samples, false, time_ms).unwrap());
        assert!(link.radar_in_progress());

        // Plenty of room once drained, but the radar frame is still open
        time_ms += 1000;
        assert!(!link.send_monitoring(12.5, time_ms).unwrap());
        assert!(!link.send_relative_pose(PoseTm::default(), time_ms).unwrap());
        assert_eq!(link.occupancy_bytes(), 0.0);

        let mut done = false;
        while !done {
            done = link.send_radar(1000.0, 999.4, &samples, false, time_ms).unwrap();
            if !done {
                assert!(!link.send_absolute_pose(PoseTm::default(), time_ms).unwrap());
            }
            time_ms += 20;
        }
        assert!(!link.radar_in_progress());

        time_ms += 1000;
        assert!(link.send_monitoring(12.5, time_ms).unwrap());
        assert!(link.send_relative_pose(PoseTm::default(), time_ms).unwrap());

        // The whole stream decodes frame by frame
        let sent = world.radio_bytes();
        let mut kinds = Vec::new();
        let mut offset = 0;
        while offset < sent.len() {
            let (msg, len) = TmMessage::decode(&sent[offset..]).unwrap();
            if let TmMessage::Radar(ref r) = msg {
                assert_eq!(r.samples, samples);
            }
            kinds.push(msg.kind());
            offset += len;
        }
        assert_eq!(offset, sent.len());
        assert_eq!(
            kinds,
            vec![TmKind::Radar, TmKind::Monitoring, TmKind::RelativePose]
        );
    }

    #[test]
    fn test_radar_restart() {
        let (mut link, world) = link(64);
        let samples = vec![7u32; 20];

        assert!(!link.send_radar(1000.0, 999.4, &samples, false, 0).unwrap());

        // Restarting sends from the first byte again
        assert!(!link.send_radar(1000.0, 999.4, &samples, true, 1000).unwrap());

        let sent = world.radio_bytes();
        assert_eq!(sent.len(), 128);
        assert_eq!(sent[..64], sent[64..]);
    }

    #[test]
    fn test_radar_too_long() {
        let (mut link, _world) = link(64);
        let samples = vec![0u32; RADAR_MAX_SAMPLES + 1];

        assert!(matches!(
            link.send_radar(1000.0, 999.4, &samples, false, 0),
            Err(TmLinkError::EncodeError(TmError::PayloadTooLong(_)))
        ));
    }
}
