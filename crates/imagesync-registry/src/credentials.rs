//! Destination credentials via token exchange.
//!
//! The destination registry does not accept the platform identity directly.
//! Instead a platform access token is obtained for a service principal and
//! exchanged at the registry for a refresh token, which then serves as the
//! registry password:
//!
//! ```text
//! ServicePrincipal ──client_credentials──▶ identity authority ──▶ PlatformToken
//! PlatformToken ──/oauth2/exchange──▶ registry ──▶ refresh token ──▶ AuthContext
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::auth::AuthContext;
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};

/// Username ACR expects alongside a refresh token.
pub const ACR_REFRESH_TOKEN_USER: &str = "00000000-0000-0000-0000-000000000000";

/// Default identity authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Default scope requested for the platform token.
pub const DEFAULT_SCOPE: &str = "https://management.azure.com/.default";

/// An access token issued for the platform identity.
#[derive(Clone)]
pub struct PlatformToken {
    token: String,
    expires_in: Option<Duration>,
}

impl PlatformToken {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_in: None,
        }
    }

    /// Sets the remaining validity.
    #[must_use]
    pub const fn with_expiry(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Returns the raw token. Callers must not log it.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.token
    }

    /// Returns the remaining validity, if reported.
    #[must_use]
    pub const fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

impl fmt::Debug for PlatformToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of platform identity tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtains a fresh platform token.
    async fn identity_token(&self) -> Result<PlatformToken>;
}

/// Exchanges a platform token for registry credentials.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Performs the exchange.
    async fn exchange_token(&self, identity: &PlatformToken) -> Result<AuthContext>;
}

/// Service principal credentials as stored in the secret store.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipalCredentials {
    /// Directory (tenant) identifier.
    pub tenant_id: String,
    /// Application (client) identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl fmt::Debug for ServicePrincipalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipalCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    refresh_token: String,
}

/// Client-credentials flow for a service principal.
#[derive(Debug)]
pub struct ServicePrincipal {
    credentials: ServicePrincipalCredentials,
    authority: String,
    scope: String,
    http: reqwest::Client,
}

impl ServicePrincipal {
    /// Creates a provider talking to the default authority.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(credentials: ServicePrincipalCredentials, timeout: Duration) -> Result<Self> {
        let http = RegistryConfig::new(DEFAULT_AUTHORITY)
            .with_timeout(timeout)
            .http_client()?;
        Ok(Self {
            credentials,
            authority: DEFAULT_AUTHORITY.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            http,
        })
    }

    /// Overrides the authority URL.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the requested scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

#[async_trait]
impl IdentityProvider for ServicePrincipal {
    async fn identity_token(&self) -> Result<PlatformToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.credentials.tenant_id
        );

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Auth {
                message: format!(
                    "identity token request for client {} failed with {status}",
                    self.credentials.client_id
                ),
            });
        }

        let body: AccessTokenResponse = serde_json::from_slice(&response.bytes().await?)?;
        debug!(client_id = %self.credentials.client_id, "Obtained platform identity token");

        let token = PlatformToken::new(body.access_token);
        Ok(match body.expires_in {
            Some(secs) => token.with_expiry(Duration::from_secs(secs)),
            None => token,
        })
    }
}

/// Exchanges platform tokens at an ACR `/oauth2/exchange` endpoint.
#[derive(Debug)]
pub struct AcrTokenExchange {
    url: String,
    service: String,
    http: reqwest::Client,
}

impl AcrTokenExchange {
    /// Creates an exchange for the registry at `config.url`.
    ///
    /// `service` is the registry host name the token is scoped to.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &RegistryConfig, service: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            service: service.into(),
            http: config.http_client()?,
        })
    }
}

#[async_trait]
impl TokenExchange for AcrTokenExchange {
    async fn exchange_token(&self, identity: &PlatformToken) -> Result<AuthContext> {
        let url = format!("{}/oauth2/exchange", self.url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "access_token"),
                ("service", self.service.as_str()),
                ("access_token", identity.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Auth {
                message: format!("token exchange with {} failed with {status}", self.service),
            });
        }

        let body: ExchangeResponse = serde_json::from_slice(&response.bytes().await?)?;
        debug!(service = %self.service, "Exchanged platform token for registry token");

        // The refresh token lives no longer than the identity it came from.
        let auth = AuthContext::basic(ACR_REFRESH_TOKEN_USER, body.refresh_token);
        Ok(match identity.expires_in() {
            Some(lifetime) => auth.with_lifetime(lifetime),
            None => auth,
        })
    }
}

/// Produces destination credentials from a platform identity.
#[derive(Clone)]
pub struct CredentialProvider {
    identity: Arc<dyn IdentityProvider>,
    exchange: Arc<dyn TokenExchange>,
}

impl CredentialProvider {
    /// Creates a provider from its two halves.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self { identity, exchange }
    }

    /// Obtains a platform token and exchanges it for registry credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Auth`] if either step is rejected, or the
    /// transport error if the endpoints cannot be reached.
    pub async fn authenticate(&self) -> Result<AuthContext> {
        let identity = self.identity.identity_token().await?;
        self.exchange.exchange_token(&identity).await
    }
}

impl fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProvider").finish_non_exhaustive()
    }
}
