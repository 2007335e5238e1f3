//! Logging setup.
//!
//! Console output plus rotating files in the platform data directory:
//!
//! - `pipewright.<date>.log`: everything that passes the filter
//! - `error.<date>.log`: warnings and errors only
//!
//! ```no_run
//! use pipewright::{config::LoggingConfig, logging};
//!
//! logging::init(&LoggingConfig::default()).expect("Failed to initialize logging");
//! tracing::info!(stage = "clean", "run started");
//! ```

use crate::config::LoggingConfig;
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Gets the log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/pipewright/logs`
/// - macOS: `~/Library/Application Support/pipewright/logs`
/// - Linux: `~/.local/share/pipewright/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("pipewright").join("logs"))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(())
}

fn env_filter(default_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Failed to create env filter")
}

/// Initializes the global subscriber.
///
/// # Errors
///
/// Returns error if the log directory cannot be created, a file appender
/// fails, or a subscriber was already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if !config.file_logging {
        tracing_subscriber::registry()
            .with(env_filter(&config.level)?)
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(());
    }

    let log_dir = match &config.directory {
        Some(dir) => dir.clone(),
        None => get_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("pipewright")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter(&config.level)?)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() {
        let log_dir = get_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("pipewright/logs") || log_dir.ends_with("pipewright\\logs"));
    }
}
