//! Error types for imagesync core operations.
//!
//! This module defines the error types used throughout the `imagesync-core` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in imagesync core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read.
    #[error("Failed to read configuration from {}: {source}", path.display())]
    ConfigRead {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed.
    #[error("Failed to parse configuration: {reason}")]
    ConfigParse {
        /// Reason for the parse failure.
        reason: String,
    },

    /// Configuration parsed but holds invalid values.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// A registry or repository reference is malformed.
    #[error("Invalid reference: {reference}")]
    InvalidReference {
        /// The offending reference.
        reference: String,
    },
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigParse {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigParse {
            reason: err.to_string(),
        }
    }
}
