//! Registry and image references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tag::TagName;

/// The registry provider backing a [`RegistryReference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Quay, listing tags through its paged tag API.
    Quay,
    /// Azure Container Registry, listing tags through a cursor pager.
    Acr,
}

impl ProviderKind {
    /// Returns the provider name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quay => "quay",
            Self::Acr => "acr",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository on a specific registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryReference {
    /// Provider serving the repository.
    pub provider: ProviderKind,
    /// Registry host, e.g. `quay.io`.
    pub registry: String,
    /// Repository path within the registry, e.g. `app-sre/aro-installer`.
    pub repository: String,
}

impl RegistryReference {
    /// Creates a reference after checking that both parts are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if the host or path is empty,
    /// contains whitespace, or the path is wrapped in slashes.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagesync_core::{ProviderKind, RegistryReference};
    ///
    /// let reference = RegistryReference::new(ProviderKind::Quay, "quay.io", "org/app").unwrap();
    /// assert_eq!(reference.to_string(), "quay.io/org/app");
    /// ```
    pub fn new(
        provider: ProviderKind,
        registry: impl Into<String>,
        repository: impl Into<String>,
    ) -> Result<Self> {
        let registry = registry.into();
        let repository = repository.into();

        if !is_valid_segment(&registry) || registry.contains('/') {
            return Err(Error::InvalidReference {
                reference: registry,
            });
        }
        if !is_valid_repository(&repository) {
            return Err(Error::InvalidReference {
                reference: repository,
            });
        }

        Ok(Self {
            provider,
            registry,
            repository,
        })
    }

    /// Returns the fully qualified image reference for `tag`.
    #[must_use]
    pub fn image(&self, tag: &TagName) -> ImageReference {
        ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: tag.clone(),
        }
    }
}

impl fmt::Display for RegistryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)
    }
}

/// A fully qualified `registry/repository:tag` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// Registry host.
    pub registry: String,
    /// Repository path.
    pub repository: String,
    /// Tag within the repository.
    pub tag: TagName,
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

fn is_valid_segment(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

/// Characters that would change the meaning of a request URL.
const URL_RESERVED: &[char] = &[':', '?', '#', '%', '\\'];

/// Returns true if `path` is usable as a repository path.
///
/// Paths are interpolated into registry API URLs, so query and fragment
/// delimiters, escapes and dot segments are refused.
#[must_use]
pub fn is_valid_repository(path: &str) -> bool {
    is_valid_segment(path)
        && !path.contains(URL_RESERVED)
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference_display() {
        let repo = RegistryReference::new(ProviderKind::Acr, "arosvc.azurecr.io", "aro/installer")
            .unwrap();
        let image = repo.image(&TagName::new("v3"));
        assert_eq!(image.to_string(), "arosvc.azurecr.io/aro/installer:v3");
    }

    #[test]
    fn test_invalid_repository_rejected() {
        for bad in ["", "/app", "app/", "a//b", "app:tag", "my app", "app?page=2"] {
            assert!(
                RegistryReference::new(ProviderKind::Quay, "quay.io", bad).is_err(),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_url_significant_repository_rejected() {
        for bad in ["org/app?x=1", "org/app#frag", "org/%2e%2e", "org/../admin", "./app", "a\\b"] {
            assert!(!is_valid_repository(bad), "accepted {bad:?}");
        }
        assert!(is_valid_repository("org/app-name_1.2"));
    }

    #[test]
    fn test_invalid_registry_rejected() {
        assert!(RegistryReference::new(ProviderKind::Quay, "", "app").is_err());
        assert!(RegistryReference::new(ProviderKind::Quay, "quay.io/x", "app").is_err());
    }

    #[test]
    fn test_provider_kind_serde() {
        let kind: ProviderKind = serde_json::from_str("\"acr\"").unwrap();
        assert_eq!(kind, ProviderKind::Acr);
        assert_eq!(ProviderKind::Quay.to_string(), "quay");
    }
}
