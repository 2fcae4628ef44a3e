//! Blocking-style calls on top of [`Engine::submit`].
//!
//! The completion callback owns the sending half of a one-shot channel, so
//! a caller that gives up first leaves nothing dangling: the callback's
//! send simply fails.

use crate::{Engine, EngineError, EngineResult};
use bytes::Bytes;
use emcdi_wire::ChannelType;
use std::sync::mpsc::{self, RecvTimeoutError};
use tokio::sync::oneshot;
use tracing::warn;

impl Engine {
    /// Submit a command and wait for its response payload.
    ///
    /// Waits at most `retry_budget × attempt_timeout`; past that the
    /// command is cancelled and [`EngineError::Timeout`] returned.
    pub async fn call_vec(
        &self,
        channel: ChannelType,
        opcode: u16,
        input: impl Into<Bytes>,
    ) -> EngineResult<Bytes> {
        let (tx, mut rx) = oneshot::channel();
        let handle = self.submit(channel, opcode, input, move |result| {
            let _ = tx.send(result);
        })?;

        match tokio::time::timeout(self.shared.config.hard_timeout(), &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::Cancelled),
            Err(_) => {
                warn!(channel = %channel, handle = %handle, opcode, "Call exceeded hard timeout, cancelling");
                self.cancel(channel, handle);
                Err(EngineError::Timeout)
            }
        }
    }

    /// Like [`Engine::call_vec`], copying the response into `output`.
    ///
    /// Returns the response length, or [`EngineError::OutputOverflow`] when
    /// it does not fit.
    pub async fn call(
        &self,
        channel: ChannelType,
        opcode: u16,
        input: impl Into<Bytes>,
        output: &mut [u8],
    ) -> EngineResult<usize> {
        let response = self.call_vec(channel, opcode, input).await?;
        let len = response.len();
        if len > output.len() {
            return Err(EngineError::OutputOverflow {
                len,
                capacity: output.len(),
            });
        }
        output[..len].copy_from_slice(&response);
        Ok(len)
    }

    /// Thread-blocking variant of [`Engine::call_vec`].
    ///
    /// For threads outside the runtime (e.g. `spawn_blocking`). Calling it
    /// on a runtime worker stalls that worker's timers.
    pub fn call_blocking(
        &self,
        channel: ChannelType,
        opcode: u16,
        input: impl Into<Bytes>,
    ) -> EngineResult<Bytes> {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = self.submit(channel, opcode, input, move |result| {
            let _ = tx.send(result);
        })?;

        match rx.recv_timeout(self.shared.config.hard_timeout()) {
            Ok(result) => result,
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Cancelled),
            Err(RecvTimeoutError::Timeout) => {
                warn!(channel = %channel, handle = %handle, opcode, "Blocking call exceeded hard timeout, cancelling");
                self.cancel(channel, handle);
                Err(EngineError::Timeout)
            }
        }
    }
}
