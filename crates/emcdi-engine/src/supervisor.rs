//! Attempt timers and busy back-off.
//!
//! Timers are plain Tokio tasks holding a weak engine reference and the
//! identity of what they guard (handle plus attempt generation). They
//! re-check that identity under the channel lock, so an expiry racing a
//! response or a resend does nothing.

use crate::command::{CommandHandle, CommandState, Completions};
use crate::{Engine, EngineError, WeakEngine};
use emcdi_wire::ChannelType;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

impl Engine {
    pub(crate) fn arm_attempt_timer(
        &self,
        channel: ChannelType,
        handle: CommandHandle,
        generation: u64,
    ) -> AbortHandle {
        let weak = self.downgrade();
        let deadline = Instant::now() + self.shared.config.attempt_timeout();
        self.shared
            .runtime
            .spawn(async move {
                sleep_until(deadline).await;
                if let Some(engine) = weak.upgrade() {
                    engine.on_attempt_timeout(channel, handle, generation);
                }
            })
            .abort_handle()
    }

    pub(crate) fn arm_backoff(&self, channel: ChannelType) -> AbortHandle {
        let weak: WeakEngine = self.downgrade();
        let deadline = Instant::now() + self.shared.config.busy_backoff();
        self.shared
            .runtime
            .spawn(async move {
                sleep_until(deadline).await;
                if let Some(engine) = weak.upgrade() {
                    engine.on_backoff_elapsed(channel);
                }
            })
            .abort_handle()
    }

    pub(crate) fn on_attempt_timeout(&self, channel: ChannelType, handle: CommandHandle, generation: u64) {
        let chan = self.channel(channel);
        let mut done = Completions::new();
        {
            let mut guard = chan.lock();
            let state = &mut *guard;
            let Some(idx) = state.position(handle) else {
                return;
            };
            let cmd = &mut state.pending[idx];
            if cmd.generation != generation || !cmd.state.is_in_flight() {
                return;
            }
            // This task is the timer; nothing left to abort.
            cmd.timer = None;

            if cmd.state == CommandState::RunningCancelled {
                state.reap(idx);
            } else {
                cmd.attempts += 1;
                let attempts = cmd.attempts;
                let elapsed_ms = cmd.started.elapsed().as_millis() as u64;
                state.counters.timeouts += 1;
                if attempts >= self.shared.config.retry_budget {
                    warn!(channel = %channel, handle = %handle, attempts, elapsed_ms, "Command timed out");
                    state.counters.failed += 1;
                    state.finish(idx, Err(EngineError::Timeout), &mut done);
                } else {
                    debug!(channel = %channel, handle = %handle, attempts, "Attempt timed out, retrying");
                    cmd.state = CommandState::Retry;
                    state.counters.retries += 1;
                    state.running = None;
                }
            }

            self.pump(chan, state, &mut done);
            chan.notify_if_idle(state);
        }
        self.complete(chan, done);
    }

    pub(crate) fn on_backoff_elapsed(&self, channel: ChannelType) {
        let chan = self.channel(channel);
        let mut done = Completions::new();
        {
            let mut guard = chan.lock();
            let state = &mut *guard;
            state.backoff = None;
            self.pump(chan, state, &mut done);
            chan.notify_if_idle(state);
        }
        self.complete(chan, done);
    }
}
