//! Engine handle, channel registry and the submit path.
//!
//! ```text
//!   caller ──submit──▶ Channel.pending ──pump──▶ encode ──▶ FrameSink
//!                           ▲                                  │
//!                           │ retry / next                     ▼
//!   completion ◀── finish ──┴──── dispatch ◀── on_frame_received (PS)
//!                                   ▲
//!                  attempt timer ───┘
//! ```
//!
//! Every state change happens under the owning channel's lock. Completions
//! are gathered while the lock is held and run once it is released.

use crate::channel::{Channel, ChannelState, ChannelStatus};
use crate::command::{Command, CommandHandle, CommandResult, CommandState, Completions};
use crate::dispatch::DropLimiter;
use crate::{EngineError, EngineResult, FrameSink, TransmitError};
use bytes::Bytes;
use emcdi_config_and_utils::EngineConfig;
use emcdi_wire::{encode, hex_words, Addressing, ChannelType, Status};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) addressing: Addressing,
    pub(crate) sink: Arc<dyn FrameSink>,
    /// Runtime that owns attempt and back-off timers.
    pub(crate) runtime: Handle,
    pub(crate) channels: [Channel; ChannelType::COUNT],
    pub(crate) drops: Mutex<DropLimiter>,
}

/// The command/response engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Engine {
    pub(crate) shared: Arc<Shared>,
}

/// Non-owning engine reference, for transports that feed responses back.
#[derive(Clone, Default)]
pub struct WeakEngine {
    shared: Weak<Shared>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.shared.upgrade().map(|shared| Engine { shared })
    }
}

impl Engine {
    /// Create an engine with every channel disabled.
    ///
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn new(config: EngineConfig, sink: Arc<dyn FrameSink>) -> EngineResult<Self> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        config
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        let drops = DropLimiter::new(config.drop_log_burst, config.drop_log_window());
        let shared = Shared {
            addressing: config.addressing(),
            config,
            sink,
            runtime,
            channels: ChannelType::ALL.map(Channel::new),
            drops: Mutex::new(drops),
        };

        debug!(local = %shared.addressing.local, remote = %shared.addressing.remote, "Engine created");
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn addressing(&self) -> &Addressing {
        &self.shared.addressing
    }

    pub(crate) fn channel(&self, channel: ChannelType) -> &Channel {
        &self.shared.channels[channel.index()]
    }

    /// Enable a channel. Succeeds immediately if it is already enabled.
    pub fn enable(&self, channel: ChannelType) -> EngineResult<()> {
        let mut state = self.channel(channel).lock();
        if state.enabled {
            return Ok(());
        }
        if !self.shared.sink.is_ready() {
            warn!(channel = %channel, "Transport not ready, channel stays disabled");
            return Err(EngineError::TransportNotReady);
        }
        state.enabled = true;
        info!(channel = %channel, last_seq = state.last_seq, "Channel enabled");
        Ok(())
    }

    /// Disable a channel and wait until it has drained.
    ///
    /// New submissions are rejected from the moment this is called. Every
    /// unfinished command completes with [`EngineError::Cancelled`].
    pub async fn disable(&self, channel: ChannelType) {
        let chan = self.channel(channel);
        let mut done = Completions::new();
        {
            let mut guard = chan.lock();
            let state = &mut *guard;
            if state.enabled {
                state.enabled = false;
                state.stop_backoff();
                while let Some(cmd) = state.pending.front() {
                    if cmd.state == CommandState::RunningCancelled {
                        state.reap(0);
                    } else {
                        state.counters.cancelled += 1;
                        state.finish(0, Err(EngineError::Cancelled), &mut done);
                    }
                }
                info!(channel = %channel, cancelled = done.len(), "Channel disabled");
            }
            chan.notify_if_idle(state);
        }
        self.complete(chan, done);
        self.wait_for_idle(channel).await;
    }

    /// Disable every channel.
    pub async fn shutdown(&self) {
        for channel in ChannelType::ALL {
            self.disable(channel).await;
        }
        info!("Engine shut down");
    }

    pub fn is_enabled(&self, channel: ChannelType) -> bool {
        self.channel(channel).lock().enabled
    }

    pub fn status(&self, channel: ChannelType) -> ChannelStatus {
        self.channel(channel).status()
    }

    /// Current state of an unfinished command; `None` once it has finished.
    pub fn command_state(&self, channel: ChannelType, handle: CommandHandle) -> Option<CommandState> {
        self.channel(channel).command_state(handle)
    }

    /// Queue a command. `on_complete` runs exactly once with the outcome.
    ///
    /// On error nothing was queued and `on_complete` is dropped uncalled.
    /// `on_complete` may run before this returns, on the caller's thread,
    /// when the outcome is decided during the first send.
    pub fn submit<F>(
        &self,
        channel: ChannelType,
        opcode: u16,
        input: impl Into<Bytes>,
        on_complete: F,
    ) -> EngineResult<CommandHandle>
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        let input = input.into();
        let max = self.shared.config.max_payload;
        if input.len() > max {
            return Err(EngineError::PayloadTooLarge {
                size: input.len(),
                max,
            });
        }

        let chan = self.channel(channel);
        let mut done = Completions::new();
        let handle = {
            let mut guard = chan.lock();
            let state = &mut *guard;
            if !state.enabled {
                return Err(EngineError::ChannelDisabled(channel));
            }
            let handle = state.allocate_handle();
            debug!(channel = %channel, handle = %handle, opcode, len = input.len(), "Command queued");
            state
                .pending
                .push_back(Command::new(handle, opcode, input, Box::new(on_complete)));
            state.counters.submitted += 1;

            self.pump(chan, state, &mut done);
            chan.notify_if_idle(state);
            handle
        };
        self.complete(chan, done);
        Ok(handle)
    }

    /// Send queued work while the channel is free.
    pub(crate) fn pump(&self, chan: &Channel, state: &mut ChannelState, done: &mut Completions) {
        while state.enabled && state.running.is_none() && state.backoff.is_none() {
            let Some(idx) = state.next_sendable() else {
                break;
            };
            self.send_attempt(chan, state, idx, done);
        }
    }

    fn send_attempt(&self, chan: &Channel, state: &mut ChannelState, idx: usize, done: &mut Completions) {
        let seq = state.last_seq.wrapping_add(1);
        let cmd = &state.pending[idx];
        let (handle, opcode) = (cmd.handle, cmd.opcode);

        let sent = encode(
            &self.shared.addressing,
            chan.kind.tx_kind(),
            seq,
            opcode,
            Status::OK,
            &cmd.input,
        )
        .map_err(|e| {
            warn!(channel = %chan.kind, handle = %handle, error = %e, "Frame encoding failed");
            TransmitError::Alloc
        })
        .and_then(|frame| {
            if self.shared.config.trace_frames {
                trace!(channel = %chan.kind, seq, frame = %hex_words(&frame), "TX frame");
            }
            self.shared.sink.send_frame(frame)
        });

        match sent {
            Ok(()) => {
                let cmd = &mut state.pending[idx];
                cmd.seq = seq;
                cmd.generation += 1;
                cmd.state = CommandState::Running;
                cmd.timer = Some(self.arm_attempt_timer(chan.kind, handle, cmd.generation));
                state.last_seq = seq;
                state.running = Some(handle);
                state.counters.sent += 1;
                debug!(channel = %chan.kind, handle = %handle, seq, opcode, "Command sent");
            }
            Err(err) => {
                let cmd = &mut state.pending[idx];
                cmd.attempts += 1;
                let attempts = cmd.attempts;
                if attempts >= self.shared.config.retry_budget {
                    warn!(channel = %chan.kind, handle = %handle, attempts, error = %err, "Transmit failed, giving up");
                    state.counters.failed += 1;
                    state.finish(idx, Err(EngineError::TransportUnavailable { attempts }), done);
                } else {
                    debug!(channel = %chan.kind, handle = %handle, attempts, error = %err, "Transmit failed, backing off");
                    cmd.state = CommandState::Retry;
                    state.counters.retries += 1;
                    state.backoff = Some(self.arm_backoff(chan.kind));
                }
            }
        }
    }
}
