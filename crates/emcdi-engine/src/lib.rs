//! # eMCDI engine
//!
//! Request/response RPC over tagged data-plane frames to a companion
//! processor, with one outstanding command per logical channel.
//!
//! ## Guarantees
//!
//! - **One in flight** - at most one command per channel is running
//! - **Exactly once** - every accepted command completes exactly once
//! - **Strict matching** - a response is accepted only for the last
//!   sequence number sent on its channel
//! - **FIFO** - queued and retrying commands are served in submission order
//!
//! ## Example
//!
//! ```rust,ignore
//! use emcdi_engine::{Engine, testing::RecordingSink};
//! use emcdi_config_and_utils::EngineConfig;
//! use emcdi_wire::ChannelType;
//! use std::sync::Arc;
//!
//! let engine = Engine::new(EngineConfig::default(), Arc::new(RecordingSink::new()))?;
//! engine.enable(ChannelType::Control)?;
//!
//! // Asynchronous: callback runs once with the outcome.
//! let handle = engine.submit(ChannelType::Control, 0x01, &b"ping"[..], |result| {
//!     tracing::info!(ok = result.is_ok(), "ping finished");
//! })?;
//!
//! // Synchronous: wait for the response payload.
//! let reply = engine.call_vec(ChannelType::Control, 0x02, &b"get"[..]).await?;
//!
//! engine.disable(ChannelType::Control).await;
//! ```

mod cancel;
mod channel;
mod command;
mod dispatch;
mod drain;
mod engine;
mod error;
mod supervisor;
mod sync_call;
mod transport;

pub mod testing;

pub use channel::{ChannelCounters, ChannelStatus};
pub use command::{CommandHandle, CommandResult, CommandState, Completion};
pub use engine::{Engine, WeakEngine};
pub use error::{EngineError, EngineResult, TransmitError};
pub use transport::FrameSink;

#[cfg(test)]
mod tests;
