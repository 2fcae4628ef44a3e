//! Subcommand implementations.

use crate::simulator::{FaultProfile, PsStats, SimulatedPs};
use emcdi_config_and_utils::{Config, EngineConfig};
use emcdi_engine::{ChannelStatus, Engine, EngineError};
use emcdi_wire::ChannelType;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Parse a channel name as printed by `ChannelType`'s `Display`.
pub fn parse_channel(name: &str) -> Result<ChannelType, String> {
    ChannelType::ALL
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let known: Vec<_> = ChannelType::ALL.iter().map(|c| c.as_str()).collect();
            format!("unknown channel '{}', expected one of: {}", name, known.join(", "))
        })
}

/// Engine wired to a simulated processor, with `channels` enabled.
pub(crate) fn start_engine(
    config: EngineConfig,
    faults: FaultProfile,
    channels: &[ChannelType],
) -> Result<(Engine, Arc<SimulatedPs>), EngineError> {
    let ps = SimulatedPs::new(config.addressing(), faults);
    let engine = Engine::new(config, ps.clone())?;
    ps.attach(&engine);
    for &channel in channels {
        engine.enable(channel)?;
    }
    Ok((engine, ps))
}

/// One call, printing the reply.
pub async fn run_ping(
    config: &Config,
    channel: ChannelType,
    opcode: u16,
    payload: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, _ps) = start_engine(config.engine.clone(), FaultProfile::default(), &[channel])?;

    let started = Instant::now();
    let result = engine.call_vec(channel, opcode, payload.into_bytes()).await;
    let elapsed = started.elapsed();
    engine.shutdown().await;

    let reply = result?;
    println!(
        "{} opcode={:#06x} {} bytes in {:.3} ms: {}",
        channel,
        opcode,
        reply.len(),
        elapsed.as_secs_f64() * 1_000.0,
        String::from_utf8_lossy(&reply)
    );
    Ok(())
}

/// Soak run parameters.
#[derive(Debug, Clone)]
pub struct SoakOptions {
    pub channels: Vec<ChannelType>,
    pub calls: usize,
    pub concurrency: usize,
    pub payload_len: usize,
    pub faults: FaultProfile,
}

/// Tally of call outcomes for one channel.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Outcomes {
    pub ok: u64,
    pub timeout: u64,
    pub remote: u64,
    pub transport: u64,
    pub cancelled: u64,
    pub other: u64,
}

impl Outcomes {
    fn record(&mut self, result: &Result<bytes::Bytes, EngineError>) {
        match result {
            Ok(_) => self.ok += 1,
            Err(EngineError::Timeout) => self.timeout += 1,
            Err(EngineError::Remote { .. }) => self.remote += 1,
            Err(EngineError::TransportUnavailable { .. }) => self.transport += 1,
            Err(EngineError::Cancelled) => self.cancelled += 1,
            Err(_) => self.other += 1,
        }
    }

    fn merge(&mut self, other: &Outcomes) {
        self.ok += other.ok;
        self.timeout += other.timeout;
        self.remote += other.remote;
        self.transport += other.transport;
        self.cancelled += other.cancelled;
        self.other += other.other;
    }

    pub fn total(&self) -> u64 {
        self.ok + self.timeout + self.remote + self.transport + self.cancelled + self.other
    }
}

#[derive(Debug, Serialize)]
pub struct ChannelReport {
    pub outcomes: Outcomes,
    pub status: ChannelStatus,
}

#[derive(Debug, Serialize)]
pub struct SoakReport {
    pub elapsed_ms: u64,
    pub faults: FaultProfile,
    pub processor: PsStats,
    pub channels: BTreeMap<String, ChannelReport>,
}

/// Drive concurrent calls on every requested channel and report.
pub async fn run_soak(config: EngineConfig, options: SoakOptions) -> Result<SoakReport, EngineError> {
    let (engine, ps) = start_engine(config, options.faults.clone(), &options.channels)?;
    let payload = bytes::Bytes::from(vec![0x5a; options.payload_len]);
    let workers = options.concurrency.max(1);

    info!(
        channels = options.channels.len(),
        calls = options.calls,
        concurrency = workers,
        "Soak started"
    );
    let started = Instant::now();

    let mut tasks = Vec::new();
    for &channel in &options.channels {
        for worker in 0..workers {
            // Spread calls evenly; the first workers take the remainder.
            let share = options.calls / workers + usize::from(worker < options.calls % workers);
            let engine = engine.clone();
            let payload = payload.clone();
            tasks.push(tokio::spawn(async move {
                let mut outcomes = Outcomes::default();
                for i in 0..share {
                    let opcode = (worker * share + i) as u16;
                    let result = engine.call_vec(channel, opcode, payload.clone()).await;
                    if let Err(e) = &result {
                        warn!(channel = %channel, opcode, error = %e, "Soak call failed");
                    }
                    outcomes.record(&result);
                }
                (channel, outcomes)
            }));
        }
    }

    let mut per_channel: BTreeMap<ChannelType, Outcomes> = BTreeMap::new();
    for task in tasks {
        match task.await {
            Ok((channel, outcomes)) => per_channel.entry(channel).or_default().merge(&outcomes),
            Err(e) => warn!(error = %e, "Soak worker panicked"),
        }
    }
    let elapsed = started.elapsed();

    let channels = options
        .channels
        .iter()
        .map(|&channel| {
            let report = ChannelReport {
                outcomes: per_channel.remove(&channel).unwrap_or_default(),
                status: engine.status(channel),
            };
            (channel.to_string(), report)
        })
        .collect();
    engine.shutdown().await;

    info!(elapsed_ms = elapsed.as_millis() as u64, "Soak finished");
    Ok(SoakReport {
        elapsed_ms: elapsed.as_millis() as u64,
        faults: options.faults,
        processor: ps.stats(),
        channels,
    })
}

/// Print the effective configuration.
pub fn show_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
