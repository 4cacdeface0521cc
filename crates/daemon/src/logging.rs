//! Tracing subscriber setup.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix of the rolling log files.
pub const LOG_FILE_PREFIX: &str = "noxdrive.log";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. With a `log_dir`, a daily rolling
/// file is written next to stdout; keep the returned guard alive until exit
/// or buffered lines are lost.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));

    let Some(dir) = log_dir else {
        registry.try_init().context("Failed to install tracing subscriber")?;
        return Ok(None);
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be installed once per process.
    #[test]
    fn test_init_logging_with_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        let guard = init_logging("debug", Some(&log_dir)).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());

        tracing::info!("hello from the test");
        drop(guard);

        let files: Vec<_> = fs::read_dir(&log_dir).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0]
            .file_name()
            .to_string_lossy()
            .starts_with(LOG_FILE_PREFIX));

        assert!(init_logging("info", None).is_err());
    }
}
