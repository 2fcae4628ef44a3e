//! # Observability
//!
//! Structured logging shared by eMCDI binaries.
//!
//! Library crates never install a subscriber; they only use `tracing`
//! macros with structured fields (`channel`, `handle`, `seq`, ...). A binary
//! calls [`init_with_config`] once at startup, which installs:
//!
//! - an `EnvFilter` taken from `RUST_LOG`, falling back to the configured level
//! - a JSONL file layer (default `~/.emcdi/logs/emcdi.jsonl`)
//! - an optional compact stderr layer for foreground runs
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "emcdi".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!(channel = "control", "Channel enabled");
//! ```

mod file_writer;
mod json_layer;

pub use file_writer::JsonlFileWriter;
pub use json_layer::{JsonLayer, LogRecord};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSON record.
    pub service_name: String,

    /// Default filter (e.g. "debug", "emcdi_engine=trace,info").
    /// Overridden by `RUST_LOG`.
    pub default_level: String,

    /// JSONL file path. `None` uses `~/.emcdi/logs/emcdi.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Write JSON records to `log_path`.
    pub json_file: bool,

    /// Also emit compact human-readable lines to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            json_file: true,
            also_stderr: false,
        }
    }
}

fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".emcdi").join("logs").join("emcdi.jsonl"))
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// If the log file cannot be opened, logging falls back to stderr only.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().or_else(default_log_path);

    let mut file_error = None;
    let json_layer = match (config.json_file, &log_path) {
        (true, Some(path)) => match JsonlFileWriter::open(path) {
            Ok(writer) => Some(
                JsonLayer::new(config.service_name.clone(), writer)
                    .with_filter(env_filter(&config.default_level)),
            ),
            Err(err) => {
                file_error = Some(err);
                None
            }
        },
        _ => None,
    };

    let want_stderr = config.also_stderr || json_layer.is_none();
    let stderr_layer = want_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter(&config.default_level))
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match file_error {
        Some(err) => tracing::warn!(error = %err, "Structured log file unavailable, using stderr"),
        None => tracing::debug!(
            service = %config.service_name,
            log_path = ?log_path,
            "Observability initialized"
        ),
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};
