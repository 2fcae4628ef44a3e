//! eMCDI tool - exercises the command/response engine against an
//! in-process simulated companion processor.

mod commands;
mod simulator;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use emcdi_config_and_utils::{init_logging, Config, Paths};
use emcdi_wire::ChannelType;

use crate::commands::{parse_channel, SoakOptions};
use crate::simulator::FaultProfile;

/// eMCDI command-line interface.
#[derive(Parser)]
#[command(name = "emcdi")]
#[command(about = "Drive the eMCDI command/response engine against a simulated companion processor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(short, long, global = true, env = "EMCDI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Base directory for config and logs. Defaults to ~/.emcdi
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Mirror log lines to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one command and print the response
    Ping {
        /// Channel to use (control, counter, upgrade, spawn, logger)
        #[arg(short, long, default_value = "control", value_parser = parse_channel)]
        channel: ChannelType,

        /// Opcode to send
        #[arg(short, long, default_value_t = 1)]
        opcode: u16,

        /// Payload text
        #[arg(default_value = "ping")]
        payload: String,
    },
    /// Run concurrent calls with injected faults and print per-channel counters
    Soak {
        /// Channels to exercise; repeat or comma-separate. Defaults to all.
        #[arg(short, long, value_delimiter = ',', value_parser = parse_channel)]
        channel: Vec<ChannelType>,

        /// Calls per channel
        #[arg(short = 'n', long, default_value_t = 1_000)]
        calls: usize,

        /// Concurrent callers per channel
        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,

        /// Payload size in bytes
        #[arg(long, default_value_t = 64)]
        payload_len: usize,

        /// Probability that a transmit is refused as busy
        #[arg(long, default_value_t = 0.0)]
        busy: f64,

        /// Probability that a request is never answered
        #[arg(long, default_value_t = 0.0)]
        loss: f64,

        /// Probability that a request is answered with queue-full
        #[arg(long, default_value_t = 0.0)]
        queue_full: f64,

        /// Simulated response latency in milliseconds
        #[arg(long, default_value_t = 1)]
        latency_ms: u64,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging("emcdi", level, &paths, cli.verbose);

    match cli.command {
        Commands::Ping {
            channel,
            opcode,
            payload,
        } => {
            commands::run_ping(&config, channel, opcode, payload).await?;
        }
        Commands::Soak {
            channel,
            calls,
            concurrency,
            payload_len,
            busy,
            loss,
            queue_full,
            latency_ms,
        } => {
            let channels = if channel.is_empty() {
                ChannelType::ALL.to_vec()
            } else {
                channel
            };
            let options = SoakOptions {
                channels,
                calls,
                concurrency,
                payload_len,
                faults: FaultProfile {
                    busy,
                    loss,
                    queue_full,
                    latency: Duration::from_millis(latency_ms),
                },
            };
            let report = commands::run_soak(config.engine.clone(), options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config => {
            commands::show_config(&config)?;
        }
    }

    Ok(())
}
