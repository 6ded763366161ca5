//! Logging bootstrap.
//!
//! Two sinks share one `EnvFilter` (`RUST_LOG`, default `info`):
//! - an append-only log file, `YYYY-MM-DD HH:MM:SS LEVEL message` per line
//! - stderr, compact, so failures are visible without opening the file
//!
//! The dashboard keeps the terminal in raw mode, so it asks for file-only logging.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::AppError;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSinks {
    FileAndStderr,
    FileOnly,
}

/// Initialise the global `tracing` subscriber.
///
/// Creates the log file's parent directory if needed. Calling this twice is
/// harmless: the second subscriber is silently discarded.
pub fn init(log_file: &Path, sinks: LogSinks) -> Result<(), AppError> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create log dir '{}': {e}", parent.display())))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| AppError::new(2, format!("Failed to open log file '{}': {e}", log_file.display())))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    let stderr_layer = (sinks == LogSinks::FileAndStderr).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_log_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");
        init(&path, LogSinks::FileOnly).unwrap();
        assert!(path.exists());
    }
}
