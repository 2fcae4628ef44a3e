//! Behavioural tests for the engine, driven through its public surface.
//!
//! - `scenarios.rs`    - end-to-end request/response flows
//! - `responses.rs`    - inbound matching, remote status handling, drops
//! - `retries.rs`      - attempt timers, send failures, budget exhaustion
//! - `cancellation.rs` - cancel in every state, cancel/response races
//! - `lifecycle.rs`    - enable, disable, drain, shutdown
//! - `sync_calls.rs`   - `call`, `call_vec`, `call_blocking`
//! - `concurrency.rs`  - multi-threaded submitters, cancellers and receivers

mod lifecycle;
mod retries;

use crate::testing::{response_for, RecordingSink};
use crate::{CommandResult, Engine};
use bytes::Bytes;
use emcdi_config_and_utils::EngineConfig;
use emcdi_wire::{ChannelType, Status};
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine with every channel enabled, sending into a fresh recording sink.
pub(super) fn harness(config: EngineConfig) -> (Engine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::new(config, sink.clone()).unwrap();
    for channel in ChannelType::ALL {
        engine.enable(channel).unwrap();
    }
    (engine, sink)
}

/// Collects completion results in arrival order.
#[derive(Clone, Default)]
pub(super) struct Outcomes(Arc<Mutex<Vec<CommandResult>>>);

impl Outcomes {
    pub(super) fn callback(&self) -> impl FnOnce(CommandResult) + Send + 'static {
        let inner = self.0.clone();
        move |result| inner.lock().push(result)
    }

    pub(super) fn all(&self) -> Vec<CommandResult> {
        self.0.lock().clone()
    }

    pub(super) fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Answer `request` as the companion processor would.
pub(super) fn respond(engine: &Engine, request: &Bytes, status: Status, payload: &[u8]) {
    let frame = response_for(engine.addressing(), request, status, payload).unwrap();
    engine.on_frame_received(&frame);
}

/// Sequence number carried by an outbound frame.
pub(super) fn seq_of(engine: &Engine, request: &Bytes) -> u16 {
    emcdi_wire::decode(&engine.addressing().reversed(), request)
        .unwrap()
        .seq
}

/// Basic workflow: one command out, one response back.
#[tokio::test(start_paused = true)]
async fn basic_round_trip() {
    let (engine, sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();

    engine
        .submit(ChannelType::Control, 0x01, &b"hello"[..], outcomes.callback())
        .unwrap();
    let request = sink.last_frame().unwrap();
    respond(&engine, &request, Status::OK, b"world");

    assert_eq!(outcomes.all(), vec![Ok(Bytes::from_static(b"world"))]);
    let status = engine.status(ChannelType::Control);
    assert_eq!(status.pending, 0);
    assert_eq!(status.running, None);
    assert_eq!(status.counters.completed, 1);
}
