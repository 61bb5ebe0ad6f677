//! CLI error type.

use std::fmt;

use trainmap::app::AppError;
use trainmap::config::ConfigError;
use trainmap::fetch::FetchError;
use trainmap::logging::LoggingError;

/// Errors surfaced to the user by a command.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded, saved or understood.
    Config(String),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// The application failed to start or stop.
    App(AppError),

    /// A backend request failed.
    Fetch(FetchError),

    /// Terminal or runtime I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Fetch(e) => write!(f, "Request failed: {}", e),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::Logging(e) => Some(e),
            CliError::App(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            CliError::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
