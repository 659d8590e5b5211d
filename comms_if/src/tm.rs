//! # Telemetry messages
//!
//! Telemetry is sent to the ground over the radio link as a stream of messages with the
//! following packed, little-endian layout:
//!
//! | Offset | Size | Field                     |
//! |--------|------|---------------------------|
//! | 0      | 1    | Message kind ([`TmKind`]) |
//! | 1      | 2    | Payload length in bytes   |
//! | 3      | n    | Payload                   |
//!
//! Payloads are fixed for each kind except for [`TmKind::Radar`], which carries a variable number
//! of samples.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::convert::TryFrom;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Length of the message header.
pub const HEADER_LEN: usize = 3;

/// Length of a pose payload, 6 `f32`s.
pub const POSE_PAYLOAD_LEN: usize = 6 * 4;

/// Length of a monitoring payload, 1 `f32`.
pub const MONITORING_PAYLOAD_LEN: usize = 4;

/// Length of the fixed part of a radar payload, the two frequencies.
pub const RADAR_PAYLOAD_FIXED_LEN: usize = 2 * 4;

/// Maximum number of samples in a single radar message.
pub const RADAR_MAX_SAMPLES: usize = (u16::MAX as usize - RADAR_PAYLOAD_FIXED_LEN) / 4;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Kind tag of a telemetry message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TmKind {
    RelativePose = 1,
    AbsolutePose = 2,
    Radar = 3,
    Monitoring = 4,
}

/// A telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TmMessage {
    /// Pose estimate relative to the start of the survey
    RelativePose(PoseTm),

    /// Absolute pose from the GPS, in longitude/latitude/elevation
    AbsolutePose(PoseTm),

    /// Samples from one step of a radar sweep
    Radar(RadarTm),

    /// System health
    Monitoring(MonitoringTm),
}

#[derive(Debug, thiserror::Error)]
pub enum TmError {
    #[error("Radar message with {0} samples exceeds the maximum payload length")]
    PayloadTooLong(usize),

    #[error("Message is shorter than its header or declared payload")]
    Truncated,

    #[error("Unknown message kind {0}")]
    UnknownKind(u8),

    #[error("Payload length {found} does not match the expected length {expected} for {kind:?}")]
    LengthMismatch {
        kind: TmKind,
        expected: usize,
        found: usize,
    },

    #[error("IO error during encoding: {0}")]
    Io(#[from] std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A pose in telemetry.
///
/// For relative poses the position is in meters in the survey frame. For absolute poses `x` is
/// longitude and `y` latitude in degrees, and `z` the elevation in meters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseTm {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub roll: f32,
    pub pitch: f32,
}

/// One step of a radar sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarTm {
    pub tx_freq_mhz: f32,
    pub ref_freq_mhz: f32,
    pub samples: Vec<u32>,
}

/// System health telemetry.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringTm {
    pub battery_v: f32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TryFrom<u8> for TmKind {
    type Error = TmError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TmKind::RelativePose),
            2 => Ok(TmKind::AbsolutePose),
            3 => Ok(TmKind::Radar),
            4 => Ok(TmKind::Monitoring),
            v => Err(TmError::UnknownKind(v)),
        }
    }
}

impl TmMessage {
    /// The kind tag of this message.
    pub fn kind(&self) -> TmKind {
        match self {
            TmMessage::RelativePose(_) => TmKind::RelativePose,
            TmMessage::AbsolutePose(_) => TmKind::AbsolutePose,
            TmMessage::Radar(_) => TmKind::Radar,
            TmMessage::Monitoring(_) => TmKind::Monitoring,
        }
    }

    /// Length of the payload in bytes.
    pub fn payload_len(&self) -> usize {
        match self {
            TmMessage::RelativePose(_) | TmMessage::AbsolutePose(_) => POSE_PAYLOAD_LEN,
            TmMessage::Radar(r) => RADAR_PAYLOAD_FIXED_LEN + 4 * r.samples.len(),
            TmMessage::Monitoring(_) => MONITORING_PAYLOAD_LEN,
        }
    }

    /// Total length of the encoded message, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }

    /// Encode the message into its wire format.
    pub fn encode(&self) -> Result<Vec<u8>, TmError> {
        if let TmMessage::Radar(r) = self {
            if r.samples.len() > RADAR_MAX_SAMPLES {
                return Err(TmError::PayloadTooLong(r.samples.len()));
            }
        }

        let mut buf = Vec::with_capacity(self.encoded_len());

        buf.write_u8(self.kind() as u8)?;
        buf.write_u16::<LittleEndian>(self.payload_len() as u16)?;

        match self {
            TmMessage::RelativePose(p) | TmMessage::AbsolutePose(p) => {
                for v in [p.x, p.y, p.z, p.yaw, p.roll, p.pitch].iter() {
                    buf.write_f32::<LittleEndian>(*v)?;
                }
            }
            TmMessage::Radar(r) => {
                buf.write_f32::<LittleEndian>(r.tx_freq_mhz)?;
                buf.write_f32::<LittleEndian>(r.ref_freq_mhz)?;
                for s in r.samples.iter() {
                    buf.write_u32::<LittleEndian>(*s)?;
                }
            }
            TmMessage::Monitoring(m) => {
                buf.write_f32::<LittleEndian>(m.battery_v)?;
            }
        }

        Ok(buf)
    }

    /// Decode a single message from the start of `bytes`.
    ///
    /// Returns the message and the number of bytes it occupied, so that a stream of messages can
    /// be decoded in sequence.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), TmError> {
        if bytes.len() < HEADER_LEN {
            return Err(TmError::Truncated);
        }

        let mut cursor = Cursor::new(bytes);
        let kind = TmKind::try_from(cursor.read_u8()?)?;
        let len = cursor.read_u16::<LittleEndian>()? as usize;

        if bytes.len() < HEADER_LEN + len {
            return Err(TmError::Truncated);
        }

        let check_len = |expected: usize| {
            if len == expected {
                Ok(())
            } else {
                Err(TmError::LengthMismatch {
                    kind,
                    expected,
                    found: len,
                })
            }
        };

        let msg = match kind {
            TmKind::RelativePose | TmKind::AbsolutePose => {
                check_len(POSE_PAYLOAD_LEN)?;
                let mut v = [0f32; 6];
                cursor.read_f32_into::<LittleEndian>(&mut v)?;
                let pose = PoseTm {
                    x: v[0],
                    y: v[1],
                    z: v[2],
                    yaw: v[3],
                    roll: v[4],
                    pitch: v[5],
                };
                match kind {
                    TmKind::RelativePose => TmMessage::RelativePose(pose),
                    _ => TmMessage::AbsolutePose(pose),
                }
            }
            TmKind::Radar => {
                if len < RADAR_PAYLOAD_FIXED_LEN || (len - RADAR_PAYLOAD_FIXED_LEN) % 4 != 0 {
                    return Err(TmError::LengthMismatch {
                        kind,
                        expected: RADAR_PAYLOAD_FIXED_LEN,
                        found: len,
                    });
                }
                let tx_freq_mhz = cursor.read_f32::<LittleEndian>()?;
                let ref_freq_mhz = cursor.read_f32::<LittleEndian>()?;
                let mut samples = vec![0u32; (len - RADAR_PAYLOAD_FIXED_LEN) / 4];
                cursor.read_u32_into::<LittleEndian>(&mut samples)?;
                TmMessage::Radar(RadarTm {
                    tx_freq_mhz,
                    ref_freq_mhz,
                    samples,
                })
            }
            TmKind::Monitoring => {
                check_len(MONITORING_PAYLOAD_LEN)?;
                TmMessage::Monitoring(MonitoringTm {
                    battery_v: cursor.read_f32::<LittleEndian>()?,
                })
            }
        };

        Ok((msg, HEADER_LEN + len))
    }
}
