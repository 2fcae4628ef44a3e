//! Configuration management for the eMCDI engine and tools.

use crate::{CoreError, CoreResult, Paths};
use emcdi_wire::{Addressing, MacAddr, MAX_EXTENDED_PAYLOAD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-attempt response timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 1_000;

/// Default number of attempts before a command fails.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Default delay before a command whose send failed is tried again.
pub const DEFAULT_BUSY_BACKOFF_MS: u64 = 10;

/// Default payload ceiling, sized to fit a standard 1500-byte MTU.
pub const DEFAULT_MAX_PAYLOAD: usize = 1_400;

/// Default link addresses (locally administered).
pub const DEFAULT_LOCAL_MAC: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const DEFAULT_REMOTE_MAC: MacAddr = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);

/// Engine tuning and addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// This engine's link address.
    pub local_mac: MacAddr,
    /// The companion processor's link address.
    pub remote_mac: MacAddr,
    pub outer_vlan: u16,
    pub inner_vlan: u16,
    /// How long to wait for a response before the attempt counts as lost.
    pub attempt_timeout_ms: u64,
    /// Total attempts per command, shared by timeouts, send failures and
    /// queue-full responses.
    pub retry_budget: u32,
    /// Delay before re-trying a command whose send failed.
    pub busy_backoff_ms: u64,
    /// Largest accepted command payload.
    pub max_payload: usize,
    /// Emit raw frame words at TRACE level.
    pub trace_frames: bool,
    /// Dropped-frame warnings allowed per window before suppression.
    pub drop_log_burst: u32,
    pub drop_log_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_mac: DEFAULT_LOCAL_MAC,
            remote_mac: DEFAULT_REMOTE_MAC,
            outer_vlan: 1,
            inner_vlan: 1,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            retry_budget: DEFAULT_RETRY_BUDGET,
            busy_backoff_ms: DEFAULT_BUSY_BACKOFF_MS,
            max_payload: DEFAULT_MAX_PAYLOAD,
            trace_frames: false,
            drop_log_burst: 10,
            drop_log_window_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn addressing(&self) -> Addressing {
        Addressing {
            local: self.local_mac,
            remote: self.remote_mac,
            outer_vlan: self.outer_vlan,
            inner_vlan: self.inner_vlan,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_millis(self.busy_backoff_ms)
    }

    pub fn drop_log_window(&self) -> Duration {
        Duration::from_millis(self.drop_log_window_ms)
    }

    /// Upper bound a blocking caller waits: every attempt timing out.
    pub fn hard_timeout(&self) -> Duration {
        self.attempt_timeout() * self.retry_budget
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.retry_budget == 0 {
            return Err(CoreError::Config("retry_budget must be at least 1".into()));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(CoreError::Config("attempt_timeout_ms must be non-zero".into()));
        }
        if self.max_payload > MAX_EXTENDED_PAYLOAD {
            return Err(CoreError::Config(format!(
                "max_payload {} exceeds wire limit {}",
                self.max_payload, MAX_EXTENDED_PAYLOAD
            )));
        }
        if self.local_mac == self.remote_mac {
            return Err(CoreError::Config(
                "local_mac and remote_mac must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file (`~/.emcdi/config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.engine.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `EMCDI_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("EMCDI_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(raw) = lookup("EMCDI_ATTEMPT_TIMEOUT_MS") {
            match raw.trim().parse() {
                Ok(ms) => self.engine.attempt_timeout_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid EMCDI_ATTEMPT_TIMEOUT_MS"),
            }
        }
        if let Some(raw) = lookup("EMCDI_RETRY_BUDGET") {
            match raw.trim().parse() {
                Ok(budget) => self.engine.retry_budget = budget,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid EMCDI_RETRY_BUDGET"),
            }
        }
    }
}
