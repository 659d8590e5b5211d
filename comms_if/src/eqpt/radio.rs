//! # Telemetry radio

use super::EqptError;

/// A serial transport to the radio modem.
///
/// The modem frames the bytes itself, the transport only has to hand them over.
pub trait SerialTransport {
    /// Bring up the serial line.
    fn init(&mut self) -> Result<(), EqptError>;

    /// Queue bytes for transmission without blocking.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), EqptError>;
}
