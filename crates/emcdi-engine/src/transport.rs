//! Transmit dependency consumed by the engine.

use crate::TransmitError;
use bytes::Bytes;

/// The external transmission path.
///
/// `send_frame` is called with the owning channel's lock held, so it must
/// return promptly and must not call back into the engine on the same
/// thread. Deliver responses from another task or thread.
pub trait FrameSink: Send + Sync {
    /// Hand one encoded frame to the transmit path.
    fn send_frame(&self, frame: Bytes) -> Result<(), TransmitError>;

    /// Whether the link can carry traffic. Checked when enabling a channel.
    fn is_ready(&self) -> bool {
        true
    }
}
