//! Completion delivery and the drain barrier.
//!
//! A channel is idle when it has no unfinished commands and no collected
//! completions still waiting to run. `cleanup_pending` is raised under the
//! lock when a completion is collected and lowered after the callback
//! returns, so teardown never releases a channel while a callback that
//! belongs to it is still executing.

use crate::channel::Channel;
use crate::command::Completions;
use crate::Engine;
use emcdi_wire::ChannelType;
use std::pin::pin;

/// Lowers `cleanup_pending` when dropped, including during unwinding.
struct CleanupTicket<'a> {
    chan: &'a Channel,
}

impl Drop for CleanupTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.chan.lock();
        state.cleanup_pending = state.cleanup_pending.saturating_sub(1);
        self.chan.notify_if_idle(&state);
    }
}

impl Engine {
    /// Run collected completions. The channel lock must not be held.
    pub(crate) fn complete(&self, chan: &Channel, done: Completions) {
        if done.is_empty() {
            return;
        }
        let batch: Vec<_> = done
            .into_items()
            .into_iter()
            .map(|item| (CleanupTicket { chan }, item))
            .collect();
        for (_ticket, (completion, result)) in batch {
            completion(result);
        }
    }

    /// Wait until `channel` has no unfinished commands and no pending
    /// completion callbacks.
    pub async fn wait_for_idle(&self, channel: ChannelType) {
        let chan = self.channel(channel);
        loop {
            let mut notified = pin!(chan.idle.notified());
            notified.as_mut().enable();
            if chan.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}
