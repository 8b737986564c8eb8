//! Sync run configuration.
//!
//! Configuration is read from YAML or JSON (chosen by file extension) with
//! camelCase keys. Everything except `destination` and `images` has a
//! default.
//!
//! ```yaml
//! maxTags: 10
//! requestTimeoutSeconds: 10
//! skipLatest: true
//! destination:
//!   provider: acr
//!   url: https://arosvc.azurecr.io
//! images:
//!   - app-sre/aro-installer
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::reference::{is_valid_repository, ProviderKind, RegistryReference};

/// Default number of tags considered per repository.
pub const DEFAULT_MAX_TAGS: usize = 10;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// What to do when a repository fails to sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Abort the whole run on the first error.
    #[default]
    FailFast,
    /// Keep going with the remaining repositories and report every failure.
    Isolate,
}

/// A registry endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEndpoint {
    /// Provider type.
    pub provider: ProviderKind,
    /// Base URL, e.g. `https://quay.io`.
    pub url: String,
}

impl RegistryEndpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(provider: ProviderKind, url: impl Into<String>) -> Self {
        Self {
            provider,
            url: url.into(),
        }
    }

    /// Returns the registry host (with port, if any) taken from the URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the URL cannot be parsed or has no host.
    pub fn host(&self) -> Result<String> {
        let parsed = Url::parse(&self.url).map_err(|e| Error::InvalidConfig {
            reason: format!("invalid registry url '{}': {e}", self.url),
        })?;
        let host = parsed.host_str().ok_or_else(|| Error::InvalidConfig {
            reason: format!("registry url '{}' has no host", self.url),
        })?;
        Ok(parsed
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}")))
    }

    /// Returns the URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Builds a reference to `repository` on this endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no host or the path is invalid.
    pub fn reference(&self, repository: &str) -> Result<RegistryReference> {
        RegistryReference::new(self.provider, self.host()?, repository)
    }
}

impl Default for RegistryEndpoint {
    fn default() -> Self {
        Self::new(ProviderKind::Quay, "https://quay.io")
    }
}

/// Where credentials are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretsConfig {
    /// Directory holding secret files.
    pub directory: PathBuf,
    /// File with the source registry bearer token.
    pub source_token_file: String,
    /// JSON file with the service principal used for token exchange.
    pub identity_file: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/secrets"),
            source_token_file: "quay-token".to_string(),
            identity_file: "azure-credentials.json".to_string(),
        }
    }
}

/// Configuration for a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Tag cap per repository.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// Per-request network timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Whether the `latest` tag is filtered out.
    #[serde(default = "default_true")]
    pub skip_latest: bool,

    /// Repository paths to sync, in order.
    pub images: Vec<String>,

    /// Registry tags are read from.
    #[serde(default)]
    pub source: RegistryEndpoint,

    /// Registry tags are copied to.
    pub destination: RegistryEndpoint,

    /// Number of repositories synced at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Failure handling across repositories.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Secret file locations.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

const fn default_max_tags() -> usize {
    DEFAULT_MAX_TAGS
}

const fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

const fn default_true() -> bool {
    true
}

const fn default_concurrency() -> usize {
    1
}

impl SyncConfig {
    /// Creates a configuration with defaults for everything but the
    /// destination and image list.
    #[must_use]
    pub fn new(destination: RegistryEndpoint, images: Vec<String>) -> Self {
        Self {
            max_tags: DEFAULT_MAX_TAGS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECS,
            skip_latest: true,
            images,
            source: RegistryEndpoint::default(),
            destination,
            concurrency: 1,
            failure_policy: FailurePolicy::FailFast,
            secrets: SecretsConfig::default(),
        }
    }

    /// Loads and validates configuration from a file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Parses and validates YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.max_tags == 0 {
            return Err(invalid("maxTags must be at least 1"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(invalid("requestTimeoutSeconds must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.images.is_empty() {
            return Err(invalid("images must not be empty"));
        }
        if let Some(bad) = self.images.iter().find(|i| !is_valid_repository(i)) {
            return Err(invalid(&format!("invalid image path '{bad}'")));
        }

        self.source.host()?;
        self.destination.host()?;

        Ok(())
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidConfig {
        reason: reason.to_string(),
    }
}
