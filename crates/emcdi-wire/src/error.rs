//! Frame codec error types.

use thiserror::Error;

/// Errors produced while encoding or decoding an eMCDI frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is shorter than the fixed envelope.
    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// Destination address is not this engine.
    #[error("frame not addressed to us (dst {0})")]
    NotAddressedToUs(String),

    /// Source address is not the companion processor.
    #[error("unexpected frame source {0}")]
    UnexpectedSource(String),

    /// Outer or inner tag protocol identifier mismatch.
    #[error("bad tag protocol identifier {0:#06x}")]
    BadTag(u16),

    /// Encapsulation ethertype mismatch.
    #[error("bad encapsulation ethertype {0:#06x}")]
    BadEthertype(u16),

    /// Header kind byte is not in the kind table.
    #[error("unknown header kind {0:#04x}")]
    UnknownHeaderKind(u8),

    /// Command header declares more payload than the frame carries.
    #[error("truncated payload: header says {declared} bytes, frame has {available}")]
    Truncated { declared: usize, available: usize },

    /// Payload does not fit the extended header length field.
    #[error("payload too large: {size} bytes, max {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Malformed MAC address text.
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

/// Result type alias using FrameError.
pub type FrameResult<T> = Result<T, FrameError>;
