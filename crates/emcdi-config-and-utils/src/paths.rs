//! File system paths for eMCDI tools.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for eMCDI tools.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.emcdi)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.emcdi`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".emcdi"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.emcdi).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.emcdi/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the logs directory (~/.emcdi/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the structured log file path (~/.emcdi/logs/emcdi.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("emcdi.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
