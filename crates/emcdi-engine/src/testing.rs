//! Test transport and response helpers.
//!
//! [`RecordingSink`] stands in for the transmit path: it keeps every frame
//! it accepted and can be scripted to refuse sends or report not ready.
//! [`response_for`] builds the frame the companion processor would answer
//! a recorded request with.

use crate::{FrameSink, TransmitError};
use bytes::Bytes;
use emcdi_wire::{decode, encode, Addressing, FrameResult, HeaderKind, Status};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A `FrameSink` that records accepted frames.
pub struct RecordingSink {
    frames: Mutex<Vec<Bytes>>,
    failures: Mutex<VecDeque<TransmitError>>,
    ready: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            ready: AtomicBool::new(true),
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `count` sends with `error`.
    pub fn fail_next(&self, count: usize, error: TransmitError) {
        self.failures.lock().extend(std::iter::repeat(error).take(count));
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Frames accepted so far, oldest first.
    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    pub fn last_frame(&self) -> Option<Bytes> {
        self.frames.lock().last().cloned()
    }

    pub fn take_frames(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.frames.lock())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&self, frame: Bytes) -> Result<(), TransmitError> {
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.frames.lock().push(frame);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Build the companion processor's answer to `request`.
///
/// `addr` is the engine's own addressing; the response travels the other
/// way and echoes the request's kind, sequence number and opcode. Counter
/// stream requests are answered on the counter acknowledgement kind.
pub fn response_for(addr: &Addressing, request: &[u8], status: Status, payload: &[u8]) -> FrameResult<Bytes> {
    let peer = addr.reversed();
    let req = decode(&peer, request)?;
    let kind = match req.kind {
        HeaderKind::CounterStream => HeaderKind::CounterAck,
        other => other,
    };
    encode(&peer, kind, req.seq, req.opcode, status, payload)
}
