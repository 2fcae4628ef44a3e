//! Configuration, paths, and logging setup shared by eMCDI crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, EngineConfig, DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_BUSY_BACKOFF_MS, DEFAULT_LOCAL_MAC,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_PAYLOAD, DEFAULT_REMOTE_MAC, DEFAULT_RETRY_BUDGET,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, LogConfig};
pub use paths::Paths;
