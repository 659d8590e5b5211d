//! TmLink parameters

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TmLinkParams {
    /// Over-the-air bitrate of the radio link.
    ///
    /// Units: bits/second
    pub bitrate_bps: f64,

    /// Size of the radio's transmit buffer.
    ///
    /// Units: bytes
    pub queue_capacity_bytes: usize,
}
