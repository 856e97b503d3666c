//! Logging for thuto
//!
//! Log files rotate daily in the XDG state directory
//! (`~/.local/state/thuto/thuto.YYYY-MM-DD.log`). `RUST_LOG` overrides the
//! configured level.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_PREFIX: &str = "thuto";
const LOG_SUFFIX: &str = "log";

/// Keeps the background log writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Install the global subscriber writing to the rolling log files.
///
/// Fails if the level is not a valid filter, the log directory cannot be
/// created, or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = level_filter(&config.level)?;
    let (writer, guard) = file_writer(&log_dir(), config.max_files)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir().display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Test subscriber printing through the test harness. Safe to call repeatedly.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Directory holding the rotated log files.
pub fn log_dir() -> PathBuf {
    Config::state_dir()
}

/// Log file written on `day`.
pub fn log_file_for(day: NaiveDate) -> PathBuf {
    log_dir().join(format!(
        "{}.{}.{}",
        LOG_PREFIX,
        day.format("%Y-%m-%d"),
        LOG_SUFFIX
    ))
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::Config(format!("invalid log level {:?}: {}", level, e))),
    }
}

fn file_writer(dir: &Path, max_files: usize) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(max_files.max(1))
        .build(dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))?;

    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_for_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = log_file_for(day);
        assert!(path.ends_with("thuto/thuto.2024-03-09.log"));
    }

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(matches!(level_filter("loud=[["), Err(Error::Config(_))));
        assert!(level_filter("debug").is_ok());
        assert!(level_filter("thuto_core=trace,warn").is_ok());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("state").join("thuto");
        let (_writer, _guard) = file_writer(&nested, 0).unwrap();
        assert!(nested.is_dir());
    }
}
