//! The registry capability shared by every provider.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use imagesync_core::{ProviderKind, TagName, TagSet};

use crate::acr::AcrClient;
use crate::auth::AuthContext;
use crate::config::RegistryConfig;
use crate::enumerator::{EnumerationPolicy, TagEnumerator};
use crate::error::Result;
use crate::quay::QuayClient;

/// Opaque continuation token handed back by a provider.
///
/// Each provider decides what goes inside: Quay stores a page number, ACR
/// stores the `next` link. Only the provider that issued a token reads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    /// Wraps a provider-specific token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a tag listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPage {
    /// Tags on this page in provider order.
    pub tags: Vec<TagName>,
    /// Token for the following page, if the provider reports one.
    pub next: Option<PageToken>,
}

impl TagPage {
    /// Creates a page.
    #[must_use]
    pub const fn new(tags: Vec<TagName>, next: Option<PageToken>) -> Self {
        Self { tags, next }
    }
}

/// Read access to a registry's tags and repositories.
///
/// Implementations attach their own credentials and map provider responses
/// onto [`RegistryError`](crate::RegistryError):
///
/// - `Auth` for rejected credentials
/// - `NotFound` when a listing targets an absent repository
/// - `Transient` for network failures, timeouts and 5xx
/// - `Protocol` for malformed responses
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Returns the provider type.
    fn provider(&self) -> ProviderKind;

    /// Fetches one page of tags. `token` is `None` for the first page.
    async fn fetch_tag_page(&self, repository: &str, token: Option<&PageToken>)
        -> Result<TagPage>;

    /// Returns whether `repository` exists.
    ///
    /// Absence is `Ok(false)`, never an error.
    async fn repository_exists(&self, repository: &str) -> Result<bool>;

    /// Lists tags under `policy`, paging as far as the cap requires.
    async fn list_tags(&self, repository: &str, policy: &EnumerationPolicy) -> Result<TagSet> {
        TagEnumerator::new(*policy).enumerate(self, repository).await
    }
}

/// Builds the client for `provider`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn registry_client(
    provider: ProviderKind,
    config: RegistryConfig,
    auth: AuthContext,
) -> Result<Arc<dyn RegistryClient>> {
    Ok(match provider {
        ProviderKind::Quay => Arc::new(QuayClient::new(config, auth)?),
        ProviderKind::Acr => Arc::new(AcrClient::new(config, auth)?),
    })
}
