//! Command lifecycle.
//!
//! ```text
//!            submit
//!              │
//!              ▼
//!          ┌────────┐  send ok   ┌─────────┐  response ok / remote error
//!          │ Queued │───────────▶│ Running │───────────────────────────┐
//!          └────────┘            └─────────┘                           │
//!              │  send failed      │     │ timeout / queue-full        │
//!              ▼                   │     ▼                             ▼
//!          ┌────────┐◀─────────────┘  ┌───────┐  budget spent   ┌──────────┐
//!          │ Retry  │◀────────────────│       │────────────────▶│ Finished │
//!          └────────┘                 └───────┘                 └──────────┘
//!                                  cancel │                          ▲
//!                                         ▼                          │
//!                              ┌──────────────────┐ response/timeout │
//!                              │ RunningCancelled │──────────────────┘
//!                              └──────────────────┘   (silent reap)
//! ```
//!
//! A command leaves the channel's pending list exactly once, and its
//! completion is taken out of the command at the same moment, so the
//! callback cannot fire twice.

use crate::EngineError;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Caller-visible identifier for a submitted command, unique per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CommandHandle(pub u64);

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    /// Not yet sent.
    Queued,
    /// Sent, awaiting a response or the attempt timer.
    Running,
    /// Waiting to be resent once the channel frees.
    Retry,
    /// Owner already notified; kept until the outstanding attempt resolves.
    RunningCancelled,
    Finished,
}

impl CommandState {
    pub(crate) fn is_sendable(self) -> bool {
        matches!(self, Self::Queued | Self::Retry)
    }

    pub(crate) fn is_in_flight(self) -> bool {
        matches!(self, Self::Running | Self::RunningCancelled)
    }
}

/// Outcome delivered to a completion callback.
pub type CommandResult = Result<Bytes, EngineError>;

/// Completion callback, invoked exactly once and never under a channel lock.
pub type Completion = Box<dyn FnOnce(CommandResult) + Send + 'static>;

pub(crate) struct Command {
    pub(crate) handle: CommandHandle,
    pub(crate) opcode: u16,
    pub(crate) input: Bytes,
    pub(crate) state: CommandState,
    pub(crate) seq: u16,
    /// Failed attempts so far: timeouts, send failures and queue-full replies.
    pub(crate) attempts: u32,
    /// Bumped on every send; an attempt timer only acts on its own generation.
    pub(crate) generation: u64,
    pub(crate) started: Instant,
    pub(crate) completion: Option<Completion>,
    pub(crate) timer: Option<AbortHandle>,
}

impl Command {
    pub(crate) fn new(handle: CommandHandle, opcode: u16, input: Bytes, completion: Completion) -> Self {
        Self {
            handle,
            opcode,
            input,
            state: CommandState::Queued,
            seq: 0,
            attempts: 0,
            generation: 0,
            started: Instant::now(),
            completion: Some(completion),
            timer: None,
        }
    }

    pub(crate) fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("handle", &self.handle)
            .field("opcode", &self.opcode)
            .field("state", &self.state)
            .field("seq", &self.seq)
            .field("attempts", &self.attempts)
            .field("input_len", &self.input.len())
            .finish()
    }
}

/// Callbacks collected under a channel lock, to be run after it is released.
#[must_use]
#[derive(Default)]
pub(crate) struct Completions {
    items: Vec<(Completion, CommandResult)>,
}

impl Completions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, completion: Completion, result: CommandResult) {
        self.items.push((completion, result));
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn into_items(self) -> Vec<(Completion, CommandResult)> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(CommandState::Queued.is_sendable());
        assert!(CommandState::Retry.is_sendable());
        assert!(!CommandState::Running.is_sendable());
        assert!(!CommandState::RunningCancelled.is_sendable());

        assert!(CommandState::Running.is_in_flight());
        assert!(CommandState::RunningCancelled.is_in_flight());
        assert!(!CommandState::Finished.is_in_flight());
    }

    #[tokio::test]
    async fn test_new_command_is_queued() {
        let cmd = Command::new(CommandHandle(1), 0x20, Bytes::from_static(b"x"), Box::new(|_| {}));
        assert_eq!(cmd.state, CommandState::Queued);
        assert_eq!(cmd.attempts, 0);
        assert!(cmd.completion.is_some());
        assert!(cmd.timer.is_none());
        assert!(format!("{:?}", cmd).contains("input_len: 1"));
    }

    #[test]
    fn test_completions_collect_in_order() {
        let mut done = Completions::new();
        assert!(done.is_empty());
        done.push(Box::new(|_| {}), Err(EngineError::Timeout));
        done.push(Box::new(|_| {}), Ok(Bytes::new()));
        assert_eq!(done.len(), 2);
        let items = done.into_items();
        assert!(matches!(items[0].1, Err(EngineError::Timeout)));
        assert!(items[1].1.is_ok());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(CommandHandle(42).to_string(), "#42");
    }
}
