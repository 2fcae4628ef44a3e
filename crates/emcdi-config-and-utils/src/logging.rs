//! Logging initialization for eMCDI binaries.
//!
//! Thin wrapper over the observability crate so binaries pick up the same
//! JSONL location as the rest of the tooling.

use crate::Paths;
pub use observability::LogConfig;

/// Initialize logging for a binary.
///
/// `level` is the default filter; `RUST_LOG` still wins when set. When
/// `foreground` is true, compact lines are mirrored to stderr.
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, foreground: bool) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        json_file: true,
        also_stderr: foreground,
    });
}
