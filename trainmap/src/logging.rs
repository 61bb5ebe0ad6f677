//! Tracing subscriber setup.
//!
//! Logs go to stderr with local timestamps and, optionally, to a file via a
//! non-blocking writer. `RUST_LOG` takes precedence over the configured
//! level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {message}")]
    Filter { directive: String, message: String },

    #[error("log file {0} has no file name")]
    FileName(PathBuf),

    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Keeps the file writer flushing; drop it on exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Build the filter: `RUST_LOG` if set, else `level`.
pub fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::Filter {
            directive: level.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Install the global subscriber.
pub fn init(level: &str, file: Option<&Path>) -> Result<LoggingGuard, LoggingError> {
    let filter = filter(level)?;
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(true);

    let (file_layer, guard) = match file {
        Some(path) => {
            let name = path
                .file_name()
                .ok_or_else(|| LoggingError::FileName(path.to_path_buf()))?;
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;

            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuard { _file: guard })
}
