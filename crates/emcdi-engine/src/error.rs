//! Engine error types.

use emcdi_wire::ChannelType;
use thiserror::Error;

/// Terminal outcome of a command other than success, plus lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Channel is not enabled; nothing was queued.
    #[error("channel {0} is not enabled")]
    ChannelDisabled(ChannelType),

    /// The transmit path reported not ready while enabling a channel.
    #[error("transport not ready")]
    TransportNotReady,

    /// Every attempt to hand the frame to the transmit path failed.
    #[error("transport unavailable after {attempts} attempts")]
    TransportUnavailable { attempts: u32 },

    /// The companion processor answered with a non-zero status.
    #[error("remote reported status {status:#04x}")]
    Remote { status: u8 },

    /// No valid response within the retry budget.
    #[error("command timed out")]
    Timeout,

    /// The command was cancelled by its owner or by channel teardown.
    #[error("command cancelled")]
    Cancelled,

    /// Input exceeds the configured payload ceiling.
    #[error("payload too large: {size} bytes, max {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Response does not fit the caller's output buffer.
    #[error("response of {len} bytes does not fit output buffer of {capacity} bytes")]
    OutputOverflow { len: usize, capacity: usize },

    /// Engine was constructed outside a Tokio runtime.
    #[error("no Tokio runtime available for engine timers")]
    NoRuntime,

    /// Engine configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by the transmit path. Always treated as transient.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// Transmit queue full.
    #[error("transmit queue busy")]
    Busy,

    /// Link is down or not yet up.
    #[error("link down")]
    LinkDown,

    /// Buffer allocation or encoding failed.
    #[error("frame allocation failed")]
    Alloc,
}
