//! Per-channel state.

use crate::command::{Command, CommandHandle, CommandState, Completions};
use crate::CommandResult;
use emcdi_wire::ChannelType;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

/// Monotonic per-channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelCounters {
    pub submitted: u64,
    /// Frames handed to the transmit path, including resends.
    pub sent: u64,
    /// Commands finished with a success status.
    pub completed: u64,
    /// Commands finished with a remote error, timeout or transport failure.
    pub failed: u64,
    /// Attempts that were rescheduled instead of failing.
    pub retries: u64,
    /// Attempt timer expirations that found the command still running.
    pub timeouts: u64,
    pub cancelled: u64,
    pub dropped_frames: u64,
}

/// Point-in-time view of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub channel: ChannelType,
    pub enabled: bool,
    /// Unfinished commands, including one awaiting silent reaping.
    pub pending: usize,
    pub running: Option<CommandHandle>,
    pub last_seq: u16,
    /// Completions collected but not yet run.
    pub cleanup_pending: usize,
    pub counters: ChannelCounters,
}

pub(crate) struct ChannelState {
    pub(crate) enabled: bool,
    /// Unfinished commands in submission order.
    pub(crate) pending: VecDeque<Command>,
    /// The single command in `Running` or `RunningCancelled`.
    pub(crate) running: Option<CommandHandle>,
    pub(crate) last_seq: u16,
    pub(crate) next_handle: u64,
    pub(crate) cleanup_pending: usize,
    /// Armed after a send failure or queue-full reply; holds off resends.
    pub(crate) backoff: Option<AbortHandle>,
    pub(crate) counters: ChannelCounters,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            enabled: false,
            pending: VecDeque::new(),
            running: None,
            last_seq: 0,
            next_handle: 0,
            cleanup_pending: 0,
            backoff: None,
            counters: ChannelCounters::default(),
        }
    }

    pub(crate) fn allocate_handle(&mut self) -> CommandHandle {
        self.next_handle += 1;
        CommandHandle(self.next_handle)
    }

    pub(crate) fn position(&self, handle: CommandHandle) -> Option<usize> {
        self.pending.iter().position(|cmd| cmd.handle == handle)
    }

    pub(crate) fn next_sendable(&self) -> Option<usize> {
        self.pending.iter().position(|cmd| cmd.state.is_sendable())
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.cleanup_pending == 0
    }

    /// Remove the command at `idx` and queue its completion with `result`.
    ///
    /// Clears `running` if it pointed at this command.
    pub(crate) fn finish(&mut self, idx: usize, result: CommandResult, done: &mut Completions) {
        let Some(mut cmd) = self.pending.remove(idx) else {
            return;
        };
        cmd.state = CommandState::Finished;
        cmd.stop_timer();
        if self.running == Some(cmd.handle) {
            self.running = None;
        }
        if let Some(completion) = cmd.completion.take() {
            self.cleanup_pending += 1;
            done.push(completion, result);
        }
    }

    /// Remove a cancelled command whose owner was already notified.
    pub(crate) fn reap(&mut self, idx: usize) {
        if let Some(mut cmd) = self.pending.remove(idx) {
            cmd.stop_timer();
            if self.running == Some(cmd.handle) {
                self.running = None;
            }
            tracing::debug!(handle = %cmd.handle, seq = cmd.seq, "Reaped cancelled command");
        }
    }

    pub(crate) fn stop_backoff(&mut self) {
        if let Some(backoff) = self.backoff.take() {
            backoff.abort();
        }
    }
}

pub(crate) struct Channel {
    pub(crate) kind: ChannelType,
    state: Mutex<ChannelState>,
    /// Signalled whenever the channel may have become idle.
    pub(crate) idle: Notify,
}

impl Channel {
    pub(crate) fn new(kind: ChannelType) -> Self {
        Self {
            kind,
            state: Mutex::new(ChannelState::new()),
            idle: Notify::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock()
    }

    /// Wake drain waiters if `state` is idle. Call before dropping the guard.
    pub(crate) fn notify_if_idle(&self, state: &ChannelState) {
        if state.is_idle() {
            self.idle.notify_waiters();
        }
    }

    pub(crate) fn status(&self) -> ChannelStatus {
        let state = self.lock();
        ChannelStatus {
            channel: self.kind,
            enabled: state.enabled,
            pending: state.pending.len(),
            running: state.running,
            last_seq: state.last_seq,
            cleanup_pending: state.cleanup_pending,
            counters: state.counters,
        }
    }

    pub(crate) fn command_state(&self, handle: CommandHandle) -> Option<CommandState> {
        let state = self.lock();
        state.position(handle).map(|idx| state.pending[idx].state)
    }
}
