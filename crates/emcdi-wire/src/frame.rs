//! Envelope encoding and decoding.
//!
//! # Frame Layout
//!
//! All multi-byte fields are big-endian.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  Link header (22 bytes)                                        │
//! │  ├─ dst: [u8; 6]                                               │
//! │  ├─ src: [u8; 6]                                               │
//! │  ├─ outer tag: TPID 0x88a8, TCI u16                            │
//! │  ├─ inner tag: TPID 0x8100, TCI u16                            │
//! │  └─ encapsulation ethertype: u16 (0x88b5)                      │
//! ├────────────────────────────────────────────────────────────────┤
//! │  eMCDI header (4 bytes)                                        │
//! │  ├─ kind: u8          (HeaderKind)                             │
//! │  ├─ reserved: u8                                               │
//! │  └─ seq: u16                                                   │
//! ├────────────────────────────────────────────────────────────────┤
//! │  Command header                                                │
//! │  compact  (4 bytes): len:u8 (bit 7 clear) status:u8 opcode:u16 │
//! │  extended (6 bytes): 0x80 status:u8 opcode:u16 len:u16         │
//! ├────────────────────────────────────────────────────────────────┤
//! │  payload[len], then zero padding up to MIN_FRAME_LEN           │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use crate::{Addressing, ChannelType, FrameError, FrameResult, HeaderKind, MacAddr};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt::Write;

/// Outer (service) tag protocol identifier.
pub const OUTER_TPID: u16 = 0x88a8;

/// Inner (customer) tag protocol identifier.
pub const INNER_TPID: u16 = 0x8100;

/// Encapsulation marker identifying eMCDI traffic.
pub const ENCAP_ETHERTYPE: u16 = 0x88b5;

/// Link header plus eMCDI header.
pub const ENVELOPE_LEN: usize = 26;

pub const COMPACT_HEADER_LEN: usize = 4;
pub const EXTENDED_HEADER_LEN: usize = 6;

/// Largest payload that fits a compact command header.
pub const MAX_COMPACT_PAYLOAD: usize = 0x7f;

/// Largest payload the extended length field can describe.
pub const MAX_EXTENDED_PAYLOAD: usize = u16::MAX as usize;

/// Frames are padded up to this length on the wire.
pub const MIN_FRAME_LEN: usize = 60;

const EXTENDED_FLAG: u8 = 0x80;
const VLAN_MASK: u16 = 0x0fff;

/// Status byte carried in the command header.
///
/// Requests always carry [`Status::OK`]. Responses carry the remote result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub u8);

impl Status {
    pub const OK: Status = Status(0x00);
    /// The remote queue was full; the request may be resent.
    pub const QUEUE_FULL: Status = Status(0x10);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn is_queue_full(self) -> bool {
        self == Self::QUEUE_FULL
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: HeaderKind,
    pub seq: u16,
    pub opcode: u16,
    pub status: Status,
    pub payload: Bytes,
}

impl Frame {
    /// Channel this frame is routed to.
    pub fn channel(&self) -> ChannelType {
        self.kind.channel()
    }
}

/// Encode a frame from `addr.local` to `addr.remote`.
pub fn encode(
    addr: &Addressing,
    kind: HeaderKind,
    seq: u16,
    opcode: u16,
    status: Status,
    payload: &[u8],
) -> FrameResult<Bytes> {
    let len = payload.len();
    if len > MAX_EXTENDED_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: MAX_EXTENDED_PAYLOAD,
        });
    }

    let extended = len > MAX_COMPACT_PAYLOAD;
    let header_len = if extended {
        EXTENDED_HEADER_LEN
    } else {
        COMPACT_HEADER_LEN
    };
    let total = (ENVELOPE_LEN + header_len + len).max(MIN_FRAME_LEN);

    let mut buf = BytesMut::with_capacity(total);
    buf.put_slice(&addr.remote.octets());
    buf.put_slice(&addr.local.octets());
    buf.put_u16(OUTER_TPID);
    buf.put_u16(addr.outer_vlan & VLAN_MASK);
    buf.put_u16(INNER_TPID);
    buf.put_u16(addr.inner_vlan & VLAN_MASK);
    buf.put_u16(ENCAP_ETHERTYPE);

    buf.put_u8(kind as u8);
    buf.put_u8(0);
    buf.put_u16(seq);

    if extended {
        buf.put_u8(EXTENDED_FLAG);
        buf.put_u8(status.0);
        buf.put_u16(opcode);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(len as u8);
        buf.put_u8(status.0);
        buf.put_u16(opcode);
    }
    buf.put_slice(payload);
    buf.resize(total, 0);

    Ok(buf.freeze())
}

/// Decode a frame that must have been sent `addr.remote -> addr.local`.
pub fn decode(addr: &Addressing, frame: &[u8]) -> FrameResult<Frame> {
    let min = ENVELOPE_LEN + COMPACT_HEADER_LEN;
    if frame.len() < min {
        return Err(FrameError::TooShort {
            len: frame.len(),
            min,
        });
    }

    let mut buf = frame;
    let dst = take_mac(&mut buf);
    if dst != addr.local {
        return Err(FrameError::NotAddressedToUs(dst.to_string()));
    }
    let src = take_mac(&mut buf);
    if src != addr.remote {
        return Err(FrameError::UnexpectedSource(src.to_string()));
    }

    let outer = buf.get_u16();
    if outer != OUTER_TPID {
        return Err(FrameError::BadTag(outer));
    }
    let _outer_tci = buf.get_u16();
    let inner = buf.get_u16();
    if inner != INNER_TPID {
        return Err(FrameError::BadTag(inner));
    }
    let _inner_tci = buf.get_u16();
    let ethertype = buf.get_u16();
    if ethertype != ENCAP_ETHERTYPE {
        return Err(FrameError::BadEthertype(ethertype));
    }

    let raw_kind = buf.get_u8();
    let kind = HeaderKind::from_u8(raw_kind).ok_or(FrameError::UnknownHeaderKind(raw_kind))?;
    let _reserved = buf.get_u8();
    let seq = buf.get_u16();

    let first = buf.get_u8();
    let status = Status(buf.get_u8());
    let opcode = buf.get_u16();
    let len = if first & EXTENDED_FLAG != 0 {
        if buf.remaining() < 2 {
            return Err(FrameError::TooShort {
                len: frame.len(),
                min: ENVELOPE_LEN + EXTENDED_HEADER_LEN,
            });
        }
        buf.get_u16() as usize
    } else {
        first as usize
    };

    if len > buf.remaining() {
        return Err(FrameError::Truncated {
            declared: len,
            available: buf.remaining(),
        });
    }

    Ok(Frame {
        kind,
        seq,
        opcode,
        status,
        payload: Bytes::copy_from_slice(&buf[..len]),
    })
}

fn take_mac(buf: &mut &[u8]) -> MacAddr {
    let mut octets = [0u8; 6];
    buf.copy_to_slice(&mut octets);
    MacAddr::new(octets)
}

/// Render a frame as offset-prefixed 32-bit big-endian words, four per line.
///
/// Used only for trace output.
pub fn hex_words(frame: &[u8]) -> String {
    let mut out = String::with_capacity(frame.len() * 3);
    for (line_no, line) in frame.chunks(16).enumerate() {
        if line_no > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04x}:", line_no * 16);
        for word in line.chunks(4) {
            out.push(' ');
            for byte in word {
                let _ = write!(out, "{byte:02x}");
            }
        }
    }
    out
}
