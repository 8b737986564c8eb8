//! Quay registry client.
//!
//! Quay lists tags through its REST API, most recently modified first:
//!
//! ```text
//! GET /api/v1/repository/{repo}/tag/?onlyActiveTags=true&limit={n}&page={p}
//! { "tags": [{ "name": "v3" }, ...], "page": 1, "has_additional": true }
//! ```
//!
//! The page token is the next page number.

use async_trait::async_trait;
use imagesync_core::{ProviderKind, TagName};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::auth::AuthContext;
use crate::client::{PageToken, RegistryClient, TagPage};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Response from the Quay tag listing endpoint.
#[derive(Debug, Deserialize)]
struct QuayTagList {
    tags: Vec<QuayTag>,
    page: u32,
    #[serde(default)]
    has_additional: bool,
}

#[derive(Debug, Deserialize)]
struct QuayTag {
    name: String,
}

/// Client for a Quay registry.
#[derive(Debug)]
pub struct QuayClient {
    config: RegistryConfig,
    http: reqwest::Client,
    auth: AuthContext,
}

impl QuayClient {
    /// Creates a Quay client.
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

    fn parse_token(token: Option<&PageToken>) -> Result<u32> {
        token.map_or(Ok(1), |t| {
            t.as_str().parse().map_err(|_| RegistryError::Protocol {
                message: format!("invalid Quay page token '{t}'"),
            })
        })
    }
}

#[async_trait]
impl RegistryClient for QuayClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Quay
    }

    async fn fetch_tag_page(
        &self,
        repository: &str,
        token: Option<&PageToken>,
    ) -> Result<TagPage> {
        let page = Self::parse_token(token)?;
        let url = format!("{}/api/v1/repository/{repository}/tag/", self.config.url);

        let request = self.http.get(&url).query(&[
            ("onlyActiveTags", "true".to_string()),
            ("limit", self.config.page_size.to_string()),
            ("page", page.to_string()),
        ]);
        let response = self.auth.apply(request)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::from_status(status, &body, repository));
        }

        let listing: QuayTagList = serde_json::from_slice(&response.bytes().await?)?;
        if listing.page != page {
            return Err(RegistryError::Protocol {
                message: format!(
                    "requested page {page} of {repository}, got page {}",
                    listing.page
                ),
            });
        }

        debug!(
            repository,
            page,
            count = listing.tags.len(),
            has_additional = listing.has_additional,
            "Fetched Quay tag page"
        );

        let next = listing
            .has_additional
            .then(|| PageToken::new((page + 1).to_string()));
        let tags = listing.tags.into_iter().map(|t| TagName::new(t.name)).collect();

        Ok(TagPage::new(tags, next))
    }

    async fn repository_exists(&self, repository: &str) -> Result<bool> {
        let url = format!("{}/api/v1/repository/{repository}", self.config.url);

        let request = self.http.get(&url).query(&[("includeTags", "false")]);
        let response = self.auth.apply(request)?.send().await?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::EnumerationPolicy;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TAGS_PATH: &str = "/api/v1/repository/org/app/tag/";

    async fn client(server: &MockServer) -> QuayClient {
        QuayClient::new(
            RegistryConfig::new(server.uri()).with_page_size(2),
            AuthContext::bearer("quay-token"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_page_with_more() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .and(query_param("page", "1"))
            .and(query_param("limit", "2"))
            .and(query_param("onlyActiveTags", "true"))
            .and(header("authorization", "Bearer quay-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": [{"name": "v3"}, {"name": "latest"}],
                "page": 1,
                "has_additional": true
            })))
            .mount(&server)
            .await;

        let page = client(&server).await.fetch_tag_page("org/app", None).await.unwrap();
        assert_eq!(page.tags, vec![TagName::new("v3"), TagName::new("latest")]);
        assert_eq!(page.next, Some(PageToken::new("2")));
    }

    #[tokio::test]
    async fn test_list_tags_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": [{"name": "latest"}, {"name": "v4"}],
                "page": 1,
                "has_additional": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": [{"name": "v3"}, {"name": "v2"}],
                "page": 2,
                "has_additional": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tags = client(&server)
            .await
            .list_tags("org/app", &EnumerationPolicy::new(4, true))
            .await
            .unwrap();
        assert_eq!(tags.to_string(), "[v4, v3, v2]");
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch_tag_page("org/app", None).await.unwrap_err();
        assert!(matches!(err, RegistryError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch_tag_page("org/app", None).await.unwrap_err();
        assert!(matches!(err, RegistryError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TAGS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch_tag_page("org/app", None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_repository_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repository/org/app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "app"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repository/org/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server).await;
        assert!(client.repository_exists("org/app").await.unwrap());
        assert!(!client.repository_exists("org/missing").await.unwrap());
    }

    #[test]
    fn test_invalid_token_rejected() {
        let err = QuayClient::parse_token(Some(&PageToken::new("abc"))).unwrap_err();
        assert!(matches!(err, RegistryError::Protocol { .. }));
        assert_eq!(QuayClient::parse_token(None).unwrap(), 1);
    }
}
