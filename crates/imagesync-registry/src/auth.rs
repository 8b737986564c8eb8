//! Authentication contexts attached to registry requests.

use std::fmt;
use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use crate::error::{RegistryError, Result};

/// How a secret is presented to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// No credentials.
    Anonymous,
    /// `Authorization: Bearer <secret>`.
    Bearer,
    /// `Authorization: Basic base64(<username>:<secret>)`.
    Basic {
        /// Username paired with the secret.
        username: String,
    },
}

/// Credentials for one registry.
///
/// Owned by the client it was issued for and never shared across
/// registries. `Debug` output never includes the secret.
#[derive(Clone)]
pub struct AuthContext {
    scheme: AuthScheme,
    secret: String,
    obtained_at: Instant,
    lifetime: Option<Duration>,
}

impl AuthContext {
    /// Creates an anonymous context.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::with_scheme(AuthScheme::Anonymous, String::new())
    }

    /// Creates a bearer token context.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::with_scheme(AuthScheme::Bearer, token.into())
    }

    /// Creates a basic auth context.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_scheme(
            AuthScheme::Basic {
                username: username.into(),
            },
            password.into(),
        )
    }

    fn with_scheme(scheme: AuthScheme, secret: String) -> Self {
        Self {
            scheme,
            secret,
            obtained_at: Instant::now(),
            lifetime: None,
        }
    }

    /// Sets how long the credentials stay valid.
    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Returns how long the credentials stay valid, if known.
    #[must_use]
    pub const fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    /// Returns the scheme.
    #[must_use]
    pub const fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    /// Returns the username for basic auth.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.scheme {
            AuthScheme::Basic { username } => Some(username),
            _ => None,
        }
    }

    /// Returns the raw secret. Callers must not log it.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }

    /// Returns true once the lifetime has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.lifetime
            .is_some_and(|lifetime| self.obtained_at.elapsed() >= lifetime)
    }

    /// Returns the `Authorization` header value, or `None` when anonymous.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Auth`] if the context has expired or the
    /// secret cannot be encoded as a header.
    pub fn authorization(&self) -> Result<Option<HeaderValue>> {
        if self.is_expired() {
            return Err(RegistryError::Auth {
                message: "credentials expired".to_string(),
            });
        }

        let raw = match &self.scheme {
            AuthScheme::Anonymous => return Ok(None),
            AuthScheme::Bearer => format!("Bearer {}", self.secret),
            AuthScheme::Basic { username } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{}", self.secret));
                format!("Basic {encoded}")
            }
        };

        let mut value = HeaderValue::from_str(&raw).map_err(|_| RegistryError::Auth {
            message: "credentials contain invalid header characters".to_string(),
        })?;
        value.set_sensitive(true);
        Ok(Some(value))
    }

    /// Attaches the credentials to a request.
    ///
    /// # Errors
    ///
    /// See [`AuthContext::authorization`].
    pub fn apply(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match self.authorization()? {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        })
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("scheme", &self.scheme)
            .field("secret", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_no_header() {
        assert!(AuthContext::anonymous().authorization().unwrap().is_none());
    }

    #[test]
    fn test_bearer_header() {
        let header = AuthContext::bearer("my-token").authorization().unwrap().unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer my-token");
        assert!(header.is_sensitive());
    }

    #[test]
    fn test_basic_header() {
        let auth = AuthContext::basic("user", "pass");
        let header = auth.authorization().unwrap().unwrap();
        assert_eq!(header.to_str().unwrap(), "Basic dXNlcjpwYXNz");
        assert_eq!(auth.username(), Some("user"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let auth = AuthContext::bearer("super-secret-token");
        let debug = format!("{auth:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_expired_context_rejected() {
        let auth = AuthContext::bearer("t").with_lifetime(Duration::ZERO);
        assert!(auth.is_expired());
        assert!(matches!(auth.authorization(), Err(RegistryError::Auth { .. })));
    }
}
