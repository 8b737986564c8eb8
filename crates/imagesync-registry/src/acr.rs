//! Azure Container Registry client.
//!
//! ACR lists tags through a cursor pager. Each response may carry an
//! RFC 5988 link to the next page:
//!
//! ```text
//! GET /acr/v1/{repo}/_tags?orderby=timedesc&n=100
//! Link: </acr/v1/{repo}/_tags?last=v7&n=100&orderby=timedesc>; rel="next"
//! { "tags": [{ "name": "v9" }, ...] }
//! ```
//!
//! The page token is the link target, followed verbatim.

use async_trait::async_trait;
use imagesync_core::{ProviderKind, TagName};
use reqwest::header::LINK;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::auth::AuthContext;
use crate::client::{PageToken, RegistryClient, TagPage};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Response from the ACR tag listing endpoint.
#[derive(Debug, Deserialize)]
struct AcrTagList {
    #[serde(default)]
    tags: Vec<AcrTag>,
}

#[derive(Debug, Deserialize)]
struct AcrTag {
    name: String,
}

/// Client for an Azure Container Registry.
#[derive(Debug)]
pub struct AcrClient {
    config: RegistryConfig,
    http: reqwest::Client,
    auth: AuthContext,
}

impl AcrClient {
    /// Creates an ACR client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: RegistryConfig, auth: AuthContext) -> Result<Self> {
        let http = config.http_client()?;
        Ok(Self { config, http, auth })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn page_url(&self, repository: &str, token: Option<&PageToken>) -> Result<String> {
        match token {
            None => Ok(format!(
                "{}/acr/v1/{repository}/_tags?orderby=timedesc&n={}",
                self.config.url, self.config.page_size
            )),
            Some(link) if link.as_str().starts_with('/') => {
                Ok(format!("{}{}", self.config.url, link.as_str()))
            }
            Some(link)
                if link
                    .as_str()
                    .strip_prefix(self.config.url.as_str())
                    .is_some_and(|rest| rest.starts_with('/')) =>
            {
                Ok(link.as_str().to_string())
            }
            Some(link) => Err(RegistryError::Protocol {
                message: format!("next link '{link}' does not point at {}", self.config.url),
            }),
        }
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[async_trait]
impl RegistryClient for AcrClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Acr
    }

    async fn fetch_tag_page(
        &self,
        repository: &str,
        token: Option<&PageToken>,
    ) -> Result<TagPage> {
        let url = self.page_url(repository, token)?;
        let response = self.auth.apply(self.http.get(&url))?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::from_status(status, &body, repository));
        }

        let next = match response.headers().get(LINK) {
            Some(value) => {
                let raw = value.to_str().map_err(|_| RegistryError::Protocol {
                    message: "Link header is not valid text".to_string(),
                })?;
                next_link(raw)
            }
            None => None,
        };

        let listing: AcrTagList = serde_json::from_slice(&response.bytes().await?)?;

        debug!(
            repository,
            count = listing.tags.len(),
            has_next = next.is_some(),
            "Fetched ACR tag page"
        );

        let tags = listing.tags.into_iter().map(|t| TagName::new(t.name)).collect();
        Ok(TagPage::new(tags, next.map(PageToken::new)))
    }

    async fn repository_exists(&self, repository: &str) -> Result<bool> {
        let url = format!("{}/acr/v1/{repository}", self.config.url);
        let response = self.auth.apply(self.http.get(&url))?.send().await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RegistryError::from_status(status, &body, repository))
            }
        }
    }
}
