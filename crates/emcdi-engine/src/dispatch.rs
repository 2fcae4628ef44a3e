//! Inbound frame dispatch.
//!
//! A response is accepted only when its channel is enabled, a command is
//! in flight, and its sequence number equals the last one sent. Anything
//! else is dropped without touching command state, and reported through a
//! rate limiter so a misbehaving peer cannot flood the log.

use crate::command::{CommandState, Completions};
use crate::{Engine, EngineError};
use emcdi_wire::{decode, hex_words, ChannelType, Frame};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

impl Engine {
    /// Feed one received frame to the engine. Never blocks on I/O.
    pub fn on_frame_received(&self, bytes: &[u8]) {
        if self.shared.config.trace_frames {
            trace!(len = bytes.len(), frame = %hex_words(bytes), "RX frame");
        }

        let frame = match decode(&self.shared.addressing, bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.report_drop(None, None, &e.to_string());
                return;
            }
        };

        let channel = frame.channel();
        let Frame {
            kind,
            seq,
            status,
            payload,
            ..
        } = frame;

        let chan = self.channel(channel);
        let mut done = Completions::new();
        {
            let mut guard = chan.lock();
            let state = &mut *guard;

            let reject = if !state.enabled {
                Some("channel disabled")
            } else if state.running.is_none() {
                Some("no command in flight")
            } else if seq != state.last_seq {
                Some("sequence mismatch")
            } else {
                None
            };
            let running = match (reject, state.running.and_then(|h| state.position(h))) {
                (None, Some(idx)) => idx,
                (reason, _) => {
                    state.counters.dropped_frames += 1;
                    drop(guard);
                    self.report_drop(Some(channel), Some(seq), reason.unwrap_or("running command missing"));
                    return;
                }
            };

            let cmd = &mut state.pending[running];
            cmd.stop_timer();
            let handle = cmd.handle;
            debug!(channel = %channel, handle = %handle, seq, kind = ?kind, status = status.0, "Response received");

            if cmd.state == CommandState::RunningCancelled {
                state.reap(running);
            } else if status.is_queue_full() {
                cmd.attempts += 1;
                let attempts = cmd.attempts;
                if attempts >= self.shared.config.retry_budget {
                    warn!(channel = %channel, handle = %handle, attempts, "Remote queue still full, giving up");
                    state.counters.failed += 1;
                    state.finish(running, Err(EngineError::Remote { status: status.0 }), &mut done);
                } else {
                    debug!(channel = %channel, handle = %handle, attempts, "Remote queue full, backing off");
                    cmd.state = CommandState::Retry;
                    state.counters.retries += 1;
                    state.running = None;
                    state.backoff = Some(self.arm_backoff(channel));
                }
            } else if status.is_ok() {
                state.counters.completed += 1;
                state.finish(running, Ok(payload), &mut done);
            } else {
                debug!(channel = %channel, handle = %handle, status = status.0, "Remote reported failure");
                state.counters.failed += 1;
                state.finish(running, Err(EngineError::Remote { status: status.0 }), &mut done);
            }

            self.pump(chan, state, &mut done);
            chan.notify_if_idle(state);
        }
        self.complete(chan, done);
    }

    fn report_drop(&self, channel: Option<ChannelType>, seq: Option<u16>, reason: &str) {
        let admitted = self.shared.drops.lock().admit(Instant::now());
        if let Some(suppressed) = admitted {
            warn!(
                channel = channel.map(ChannelType::as_str),
                seq,
                reason,
                suppressed,
                "Dropping inbound frame"
            );
        }
    }
}

/// Allows `burst` drop warnings per `window`, counting the rest.
#[derive(Debug)]
pub(crate) struct DropLimiter {
    burst: u32,
    window: Duration,
    window_start: Option<Instant>,
    emitted: u32,
    suppressed: u64,
}

impl DropLimiter {
    pub(crate) fn new(burst: u32, window: Duration) -> Self {
        Self {
            burst,
            window,
            window_start: None,
            emitted: 0,
            suppressed: 0,
        }
    }

    /// Returns the number of warnings suppressed since the last admitted one
    /// when this drop may be logged, `None` when it must stay quiet.
    pub(crate) fn admit(&mut self, now: Instant) -> Option<u64> {
        let expired = self
            .window_start
            .map_or(true, |start| now.saturating_duration_since(start) >= self.window);
        if expired {
            self.window_start = Some(now);
            self.emitted = 0;
        }

        if self.emitted < self.burst {
            self.emitted += 1;
            Some(std::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }
}
