//! Wire format for the eMCDI encapsulated command/response protocol.
//!
//! This crate contains only data types and the frame codec; no I/O, no
//! async, no transport. It defines the shared language between the engine
//! and the companion processor.

mod address;
mod error;
mod frame;
mod kind;

pub use address::{Addressing, MacAddr};
pub use error::{FrameError, FrameResult};
pub use frame::{
    decode, encode, hex_words, Frame, Status, COMPACT_HEADER_LEN, ENCAP_ETHERTYPE, ENVELOPE_LEN,
    EXTENDED_HEADER_LEN, INNER_TPID, MAX_COMPACT_PAYLOAD, MAX_EXTENDED_PAYLOAD, MIN_FRAME_LEN,
    OUTER_TPID,
};
pub use kind::{ChannelType, HeaderKind};
