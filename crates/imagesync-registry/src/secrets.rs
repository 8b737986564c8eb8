//! File-backed secret store.

use std::path::{Path, PathBuf};

use imagesync_core::SecretsConfig;

use crate::auth::AuthContext;
use crate::credentials::ServicePrincipalCredentials;
use crate::error::{RegistryError, Result};

/// Reads secrets from files in a directory, one secret per file.
#[derive(Debug, Clone)]
pub struct SecretStore {
    directory: PathBuf,
}

impl SecretStore {
    /// Creates a store rooted at `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Creates a store from configuration.
    #[must_use]
    pub fn from_config(config: &SecretsConfig) -> Self {
        Self::new(&config.directory)
    }

    /// Returns the directory secrets are read from.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Reads a secret, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Secret`] if the file is missing, unreadable
    /// or empty.
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.directory.join(name);
        let content = std::fs::read_to_string(&path).map_err(|e| RegistryError::Secret {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let value = content.trim();
        if value.is_empty() {
            return Err(RegistryError::Secret {
                path,
                message: "file is empty".to_string(),
            });
        }
        Ok(value.to_string())
    }

    /// Reads a bearer token and wraps it as credentials.
    ///
    /// # Errors
    ///
    /// See [`SecretStore::read`].
    pub fn bearer_token(&self, name: &str) -> Result<AuthContext> {
        self.read(name).map(AuthContext::bearer)
    }

    /// Reads service principal credentials stored as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Secret`] if the file cannot be read or parsed.
    pub fn service_principal(&self, name: &str) -> Result<ServicePrincipalCredentials> {
        let raw = self.read(name)?;
        serde_json::from_str(&raw).map_err(|e| RegistryError::Secret {
            path: self.directory.join(name),
            message: format!("invalid service principal: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthScheme;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_bearer_token_trimmed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("quay-token"), "  token-value\n").unwrap();

        let auth = SecretStore::new(dir.path()).bearer_token("quay-token").unwrap();
        assert_eq!(auth.scheme(), &AuthScheme::Bearer);
        assert_eq!(auth.expose_secret(), "token-value");
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        let err = SecretStore::new(dir.path()).read("absent").unwrap_err();
        assert!(matches!(err, RegistryError::Secret { .. }));
    }

    #[test]
    fn test_empty_secret() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("empty"), "\n").unwrap();
        let err = SecretStore::new(dir.path()).read("empty").unwrap_err();
        assert!(err.to_string().contains("file is empty"));
    }

    #[test]
    fn test_service_principal() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("sp.json"),
            r#"{"tenantId": "t", "clientId": "c", "clientSecret": "s"}"#,
        )
        .unwrap();

        let sp = SecretStore::new(dir.path()).service_principal("sp.json").unwrap();
        assert_eq!(sp.tenant_id, "t");
        assert_eq!(sp.client_id, "c");
        assert_eq!(sp.client_secret, "s");
    }

    #[test]
    fn test_service_principal_malformed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sp.json"), r#"{"tenantId": "t"}"#).unwrap();
        let err = SecretStore::new(dir.path()).service_principal("sp.json").unwrap_err();
        assert!(err.to_string().contains("invalid service principal"));
    }
}
