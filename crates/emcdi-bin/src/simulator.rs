//! In-process companion processor.
//!
//! Implements the engine's transmit path by decoding each request and
//! answering it from a spawned task after a configurable latency. Faults
//! are injected per frame: transmit-busy refusals, silent loss, and
//! queue-full answers.

use bytes::Bytes;
use emcdi_engine::testing::response_for;
use emcdi_engine::{Engine, FrameSink, TransmitError, WeakEngine};
use emcdi_wire::{decode, Addressing, Status};
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Per-frame fault probabilities, each in `0.0..=1.0`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FaultProfile {
    /// Refuse the send with `TransmitError::Busy`.
    pub busy: f64,
    /// Accept the frame but never answer it.
    pub loss: f64,
    /// Answer with the queue-full status instead of echoing.
    pub queue_full: f64,
    #[serde(serialize_with = "as_millis")]
    pub latency: Duration,
}

fn as_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

impl FaultProfile {
    fn clamped(self) -> Self {
        Self {
            busy: self.busy.clamp(0.0, 1.0),
            loss: self.loss.clamp(0.0, 1.0),
            queue_full: self.queue_full.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// What the simulated processor saw and did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PsStats {
    pub received: u64,
    pub refused_busy: u64,
    pub lost: u64,
    pub queue_full: u64,
    pub answered: u64,
    pub undecodable: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    refused_busy: AtomicU64,
    lost: AtomicU64,
    queue_full: AtomicU64,
    answered: AtomicU64,
    undecodable: AtomicU64,
}

/// Simulated companion processor attached to one engine.
pub struct SimulatedPs {
    addressing: Addressing,
    faults: FaultProfile,
    runtime: Handle,
    engine: OnceLock<WeakEngine>,
    counters: Counters,
}

impl SimulatedPs {
    /// Must be called within a Tokio runtime.
    pub fn new(addressing: Addressing, faults: FaultProfile) -> Arc<Self> {
        Arc::new(Self {
            addressing,
            faults: faults.clamped(),
            runtime: Handle::current(),
            engine: OnceLock::new(),
            counters: Counters::default(),
        })
    }

    /// Route answers to `engine`. Only the first call has an effect.
    pub fn attach(&self, engine: &Engine) {
        let _ = self.engine.set(engine.downgrade());
    }

    pub fn stats(&self) -> PsStats {
        let c = &self.counters;
        PsStats {
            received: c.received.load(Ordering::Relaxed),
            refused_busy: c.refused_busy.load(Ordering::Relaxed),
            lost: c.lost.load(Ordering::Relaxed),
            queue_full: c.queue_full.load(Ordering::Relaxed),
            answered: c.answered.load(Ordering::Relaxed),
            undecodable: c.undecodable.load(Ordering::Relaxed),
        }
    }

    fn roll(probability: f64) -> bool {
        probability > 0.0 && rand::thread_rng().gen::<f64>() < probability
    }
}

impl FrameSink for SimulatedPs {
    fn send_frame(&self, frame: Bytes) -> Result<(), TransmitError> {
        if Self::roll(self.faults.busy) {
            self.counters.refused_busy.fetch_add(1, Ordering::Relaxed);
            return Err(TransmitError::Busy);
        }
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let request = match decode(&self.addressing.reversed(), &frame) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Simulated PS could not decode request");
                self.counters.undecodable.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };
        if Self::roll(self.faults.loss) {
            trace!(seq = request.seq, "Simulated PS dropping request");
            self.counters.lost.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let status = if Self::roll(self.faults.queue_full) {
            self.counters.queue_full.fetch_add(1, Ordering::Relaxed);
            Status::QUEUE_FULL
        } else {
            Status::OK
        };
        let payload = if status.is_ok() {
            request.payload
        } else {
            Bytes::new()
        };
        let Ok(reply) = response_for(&self.addressing, &frame, status, &payload) else {
            self.counters.undecodable.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };
        let Some(engine) = self.engine.get().cloned() else {
            return Ok(());
        };
        self.counters.answered.fetch_add(1, Ordering::Relaxed);
        let latency = self.faults.latency;
        self.runtime.spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if let Some(engine) = engine.upgrade() {
                engine.on_frame_received(&reply);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emcdi_config_and_utils::EngineConfig;
    use emcdi_engine::EngineError;
    use emcdi_wire::ChannelType;

    fn engine_with(faults: FaultProfile) -> (Engine, Arc<SimulatedPs>) {
        let config = EngineConfig::default();
        let ps = SimulatedPs::new(config.addressing(), faults);
        let engine = Engine::new(config, ps.clone()).unwrap();
        ps.attach(&engine);
        for channel in ChannelType::ALL {
            engine.enable(channel).unwrap();
        }
        (engine, ps)
    }

    #[tokio::test(start_paused = true)]
    async fn test_echoes_payload() {
        let (engine, ps) = engine_with(FaultProfile {
            latency: Duration::from_millis(5),
            ..Default::default()
        });

        let reply = engine
            .call_vec(ChannelType::Counter, 0x11, &b"counters"[..])
            .await
            .unwrap();

        assert_eq!(&reply[..], b"counters");
        assert_eq!(ps.stats().answered, 1);
        assert_eq!(ps.stats().received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_loss_times_out() {
        let (engine, ps) = engine_with(FaultProfile {
            loss: 1.0,
            ..Default::default()
        });

        let result = engine.call_vec(ChannelType::Control, 1, &b""[..]).await;

        assert_eq!(result, Err(EngineError::Timeout));
        assert_eq!(ps.stats().lost, u64::from(engine.config().retry_budget));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_busy_is_transport_unavailable() {
        let (engine, ps) = engine_with(FaultProfile {
            busy: 1.0,
            ..Default::default()
        });

        let result = engine.call_vec(ChannelType::Logger, 1, &b""[..]).await;

        let attempts = engine.config().retry_budget;
        assert_eq!(result, Err(EngineError::TransportUnavailable { attempts }));
        assert_eq!(ps.stats().refused_busy, u64::from(attempts));
        assert_eq!(ps.stats().received, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_queue_full_reports_remote_status() {
        let (engine, _ps) = engine_with(FaultProfile {
            queue_full: 1.0,
            ..Default::default()
        });

        let result = engine.call_vec(ChannelType::Spawn, 1, &b""[..]).await;
        assert_eq!(
            result,
            Err(EngineError::Remote {
                status: Status::QUEUE_FULL.0
            })
        );
    }

    #[test]
    fn test_fault_profile_is_clamped() {
        let faults = FaultProfile {
            busy: 2.0,
            loss: -1.0,
            queue_full: 0.5,
            latency: Duration::ZERO,
        }
        .clamped();
        assert_eq!(faults.busy, 1.0);
        assert_eq!(faults.loss, 0.0);
        assert_eq!(faults.queue_full, 0.5);
    }
}
