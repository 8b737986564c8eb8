//! Configuration types for registry clients.

use std::time::Duration;

use imagesync_core::{RegistryEndpoint, SyncConfig};

use crate::error::{RegistryError, Result};

/// Default number of tags requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Configuration for a registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL (e.g., "<https://quay.io>").
    pub url: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Tags requested per page.
    pub page_size: usize,

    /// User agent string.
    pub user_agent: String,
}

impl RegistryConfig {
    /// Creates a new registry configuration with the given URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagesync_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("https://quay.io/");
    /// assert_eq!(config.url, "https://quay.io");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(imagesync_core::config::DEFAULT_REQUEST_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: format!("imagesync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Creates a configuration for `endpoint` using the run's timeout.
    #[must_use]
    pub fn for_endpoint(endpoint: &RegistryEndpoint, sync: &SyncConfig) -> Self {
        Self::new(&endpoint.url).with_timeout(sync.request_timeout())
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builds an HTTP client honouring the timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        if self.page_size == 0 {
            return Err(RegistryError::InvalidConfig {
                message: "page size must be at least 1".to_string(),
            });
        }

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| RegistryError::InvalidConfig {
                message: format!("failed to build HTTP client for {}: {e}", self.url),
            })
    }
}
