//! Error types for sync runs.
//!
//! Every failure carries the repository it happened in and, for registry
//! failures, the state the repository had reached.

use imagesync_core::SyncState;
use imagesync_registry::RegistryError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while copying an image.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The transfer tool could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Credentials for the transfer tool could not be written.
    #[error("Failed to write registry credentials: {0}")]
    Credentials(#[source] std::io::Error),

    /// The transfer ran and reported failure.
    #[error("Copy of {image} failed (exit code {code:?}): {stderr}")]
    Failed {
        /// Destination image reference.
        image: String,
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured error output.
        stderr: String,
    },

    /// Any other transfer failure.
    #[error("Copy failed: {0}")]
    Other(String),
}

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A registry call failed.
    #[error("{repository}: registry error after state '{state}': {source}")]
    Registry {
        /// Repository being synced.
        repository: String,
        /// Last state reached before the failure.
        state: SyncState,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// Copying a tag failed.
    #[error("{repository}: failed to copy {image}: {source}")]
    Transfer {
        /// Repository being synced.
        repository: String,
        /// Destination image reference.
        image: String,
        /// Underlying transfer error.
        #[source]
        source: TransferError,
    },

    /// Authentication against a registry could not be set up.
    #[error("Failed to authenticate with {registry}: {source}")]
    Authentication {
        /// Registry host.
        registry: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// The run was cancelled.
    #[error("Sync cancelled")]
    Cancelled,

    /// One or more repositories failed under the isolating policy.
    #[error("{} of {total} repositories failed", failures.len())]
    Failures {
        /// Every repository failure, in image order.
        failures: Vec<SyncError>,
        /// Number of repositories in the run.
        total: usize,
    },
}

impl SyncError {
    /// Returns the repository the error belongs to, if any.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        match self {
            Self::Registry { repository, .. } | Self::Transfer { repository, .. } => {
                Some(repository)
            }
            _ => None,
        }
    }

    /// Returns true if the error is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn registry(repository: &str, state: SyncState, source: RegistryError) -> Self {
        if matches!(source, RegistryError::Cancelled) {
            return Self::Cancelled;
        }
        Self::Registry {
            repository: repository.to_string(),
            state,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = SyncError::registry(
            "org/app",
            SyncState::SourceEnumerated,
            RegistryError::Auth {
                message: "expired".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "org/app: registry error after state 'source_enumerated': Authentication failed: expired"
        );
        assert_eq!(err.repository(), Some("org/app"));
    }

    #[test]
    fn test_cancelled_registry_error_collapses() {
        let err = SyncError::registry("org/app", SyncState::Start, RegistryError::Cancelled);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_failures_display() {
        let err = SyncError::Failures {
            failures: vec![SyncError::Cancelled],
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 repositories failed");
    }
}
