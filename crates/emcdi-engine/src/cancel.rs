//! Cancellation.

use crate::command::{CommandHandle, CommandState, Completions};
use crate::{Engine, EngineError};
use emcdi_wire::ChannelType;
use tracing::{debug, warn};

impl Engine {
    /// Cancel a command, delivering [`EngineError::Cancelled`] to its owner.
    ///
    /// A queued command is removed and never sent. A running command is
    /// marked cancelled and its owner notified at once; the channel stays
    /// busy until its response arrives or its attempt timer expires, and
    /// either is then discarded.
    ///
    /// Returns `false` when the handle is unknown, already finished, or
    /// already cancelled.
    pub fn cancel(&self, channel: ChannelType, handle: CommandHandle) -> bool {
        let chan = self.channel(channel);
        let mut done = Completions::new();
        let cancelled = {
            let mut guard = chan.lock();
            let state = &mut *guard;
            let found = state
                .position(handle)
                .map(|idx| (idx, state.pending[idx].state));
            let cancelled = match found {
                None => {
                    debug!(channel = %channel, handle = %handle, "Cancel for unknown or finished command ignored");
                    false
                }
                Some((idx, CommandState::Queued | CommandState::Retry)) => {
                    state.counters.cancelled += 1;
                    state.finish(idx, Err(EngineError::Cancelled), &mut done);
                    debug!(channel = %channel, handle = %handle, "Queued command cancelled");
                    true
                }
                Some((idx, CommandState::Running)) => {
                    let cmd = &mut state.pending[idx];
                    cmd.state = CommandState::RunningCancelled;
                    if let Some(completion) = cmd.completion.take() {
                        state.cleanup_pending += 1;
                        done.push(completion, Err(EngineError::Cancelled));
                    }
                    state.counters.cancelled += 1;
                    debug!(channel = %channel, handle = %handle, "Running command cancelled");
                    true
                }
                Some((_, CommandState::RunningCancelled | CommandState::Finished)) => {
                    warn!(channel = %channel, handle = %handle, "Command already cancelled");
                    false
                }
            };
            chan.notify_if_idle(state);
            cancelled
        };
        self.complete(chan, done);
        cancelled
    }
}
