//! Error types for registry operations.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Credentials were missing, invalid, expired or rejected.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Error message.
        message: String,
    },

    /// The registry reported the repository as absent.
    #[error("Repository not found: {repository}")]
    NotFound {
        /// Repository path.
        repository: String,
    },

    /// Network failure, timeout or server-side error.
    #[error("Transient registry error: {message}")]
    Transient {
        /// Error message.
        message: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
    },

    /// The registry answered with something that could not be understood.
    #[error("Unexpected registry response: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// A secret could not be loaded.
    #[error("Failed to read secret {}: {message}", path.display())]
    Secret {
        /// Secret file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Client configuration is unusable.
    #[error("Invalid registry configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// The operation was cancelled before it completed.
    #[error("Registry operation cancelled")]
    Cancelled,
}

impl RegistryError {
    /// Returns true if retrying the same request could succeed.
    ///
    /// Only transient failures qualify; auth and protocol errors never do.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Maps a non-success HTTP status to an error.
    ///
    /// `repository` names the repository the request was about and is used
    /// for `404` responses.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str, repository: &str) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", truncate(body, 512))
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth { message },
            StatusCode::NOT_FOUND => Self::NotFound {
                repository: repository.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => Self::Transient {
                message,
                status: Some(status.as_u16()),
            },
            s if s.is_server_error() => Self::Transient {
                message,
                status: Some(s.as_u16()),
            },
            _ => Self::Protocol { message },
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Protocol {
                message: err.to_string(),
            };
        }

        if let Some(status) = err.status() {
            return Self::from_status(status, "", "unknown");
        }

        if err.is_builder() {
            return Self::InvalidConfig {
                message: err.to_string(),
            };
        }

        Self::Transient {
            message: err.to_string(),
            status: None,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol {
            message: format!("invalid JSON: {err}"),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
