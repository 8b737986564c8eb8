//! Bounded, policy-filtered tag enumeration.
//!
//! The enumerator turns a multi-page tag listing into a [`TagSet`]:
//!
//! 1. Pages are consumed in provider order, one request per page.
//! 2. The `latest` sentinel is dropped when the policy excludes it, before
//!    it can count toward the cap.
//! 3. Enumeration stops as soon as the set holds `max_tags - 1` tags, even
//!    if the provider reports more pages.
//!
//! A cap of 10 yields at most 9 tags. A cap of 1 yields none without any
//! request.

use std::collections::HashSet;

use imagesync_core::{SyncConfig, TagName, TagSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{PageToken, RegistryClient, TagPage};
use crate::error::{RegistryError, Result};

/// Cap and exclusion rules applied while enumerating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationPolicy {
    /// Configured tag cap. At most `max_tags - 1` tags are returned.
    pub max_tags: usize,
    /// Whether the `latest` sentinel is dropped.
    pub skip_latest: bool,
}

impl Default for EnumerationPolicy {
    fn default() -> Self {
        Self::new(imagesync_core::config::DEFAULT_MAX_TAGS, true)
    }
}

impl EnumerationPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_tags: usize, skip_latest: bool) -> Self {
        Self {
            max_tags,
            skip_latest,
        }
    }

    /// Creates the policy configured for a sync run.
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.max_tags, config.skip_latest)
    }

    /// Returns the number of tags after which enumeration stops.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagesync_registry::EnumerationPolicy;
    ///
    /// assert_eq!(EnumerationPolicy::new(10, true).limit(), 9);
    /// assert_eq!(EnumerationPolicy::new(1, true).limit(), 0);
    /// ```
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.max_tags.saturating_sub(1)
    }

    /// Returns true if `tag` is filtered out.
    #[must_use]
    pub fn excludes(&self, tag: &TagName) -> bool {
        self.skip_latest && tag.is_latest()
    }
}

/// Drives a [`RegistryClient`] page by page under an [`EnumerationPolicy`].
#[derive(Debug, Clone, Default)]
pub struct TagEnumerator {
    policy: EnumerationPolicy,
    cancel: Option<CancellationToken>,
}

impl TagEnumerator {
    /// Creates an enumerator.
    #[must_use]
    pub const fn new(policy: EnumerationPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Aborts enumeration with [`RegistryError::Cancelled`] once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &EnumerationPolicy {
        &self.policy
    }

    /// Enumerates the tags of `repository`.
    ///
    /// Pages are never re-fetched; the first failing page aborts enumeration
    /// and its error is returned as is.
    ///
    /// # Errors
    ///
    /// Returns the client's error, [`RegistryError::Cancelled`], or
    /// [`RegistryError::Protocol`] if the provider hands back a token it
    /// already issued for this listing.
    pub async fn enumerate<C>(&self, client: &C, repository: &str) -> Result<TagSet>
    where
        C: RegistryClient + ?Sized,
    {
        let limit = self.policy.limit();
        let mut tags = TagSet::new();

        if limit == 0 {
            return Ok(tags);
        }

        let mut token: Option<PageToken> = None;
        let mut seen: HashSet<PageToken> = HashSet::new();
        let mut pages = 0_usize;

        loop {
            let page = self.fetch_page(client, repository, token.as_ref()).await?;
            pages += 1;

            for tag in page.tags {
                if self.policy.excludes(&tag) {
                    continue;
                }
                tags.push(tag);
                if tags.len() == limit {
                    debug!(repository, pages, count = tags.len(), "Tag cap reached");
                    return Ok(tags);
                }
            }

            match page.next {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(RegistryError::Protocol {
                        message: format!("registry repeated page token '{next}' for {repository}"),
                    });
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(repository, pages, count = tags.len(), "Tag listing exhausted");
        Ok(tags)
    }

    async fn fetch_page<C>(
        &self,
        client: &C,
        repository: &str,
        token: Option<&PageToken>,
    ) -> Result<TagPage>
    where
        C: RegistryClient + ?Sized,
    {
        let Some(cancel) = &self.cancel else {
            return client.fetch_tag_page(repository, token).await;
        };

        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RegistryError::Cancelled),
            page = client.fetch_tag_page(repository, token) => page,
        }
    }
}
