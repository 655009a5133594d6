//! Logging initialization for netwatch-daemon.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `NetwatchConfig`. Supports JSON structured logging and
//! human-readable pretty format, written to stderr or to `general.log_file`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use netwatch_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any stage is spawned.
///
/// # Arguments
///
/// * `config` - General configuration (log_level, log_format, log_file)
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable output (default)
///
/// If `log_file` is set but cannot be opened, logging falls back to stderr
/// and a warning is emitted once the subscriber is installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (writer, to_file, open_error) = match open_log_file(&config.log_file) {
        Ok(Some(file)) => (BoxMakeWriter::new(Mutex::new(file)), true, None),
        Ok(None) => (BoxMakeWriter::new(io::stderr), false, None),
        Err(e) => (BoxMakeWriter::new(io::stderr), false, Some(e)),
    };

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(!to_file)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_ansi(!to_file)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    if let Some(e) = open_error {
        tracing::warn!(
            path = %config.log_file,
            error = %e,
            "failed to open log file, using stderr"
        );
    }

    Ok(())
}

/// Open the log file in append mode.
///
/// Returns `Ok(None)` for an empty path (log to stderr).
pub fn open_log_file(path: &str) -> io::Result<Option<File>> {
    if path.is_empty() {
        return Ok(None);
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(path))
        .map(Some)
}
