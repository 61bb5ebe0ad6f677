//! Application error types.

use std::fmt;

use crate::fetch::FetchError;

/// Errors that can occur during application lifecycle.
#[derive(Debug)]
pub enum AppError {
    /// Failed to create the backend client.
    HttpClient(FetchError),

    /// The session task is no longer running.
    SessionClosed,

    /// The session task panicked or was aborted.
    SessionFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::HttpClient(e) => {
                write!(f, "Failed to create backend client: {}", e)
            }
            AppError::SessionClosed => {
                write!(f, "Map session is not running")
            }
            AppError::SessionFailed(msg) => {
                write!(f, "Map session failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::HttpClient(e) => Some(e),
            AppError::SessionClosed => None,
            AppError::SessionFailed(_) => None,
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::HttpClient(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::SessionFailed("task panicked".to_string());
        assert!(err.to_string().contains("Map session failed"));
        assert!(err.to_string().contains("task panicked"));
    }

    #[test]
    fn test_app_error_from_fetch_error() {
        let app_err: AppError = FetchError::Http("tls".to_string()).into();
        assert!(matches!(app_err, AppError::HttpClient(_)));
        assert!(std::error::Error::source(&app_err).is_some());
    }
}
