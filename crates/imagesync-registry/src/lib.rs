//! # imagesync registry
//!
//! Registry access for image tag mirroring.
//!
//! This crate provides read access to container registries through a
//! single capability, [`RegistryClient`], with one implementation per
//! provider, plus the credentials each provider needs.
//!
//! ## Features
//!
//! - **Quay**: paged tag API, bearer token auth
//! - **ACR**: cursor pager over `Link` headers, refresh token auth obtained
//!   through token exchange
//! - **Bounded enumeration**: [`TagEnumerator`] applies the tag cap and the
//!   `latest` exclusion identically for every provider
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imagesync_core::ProviderKind;
//! use imagesync_registry::{registry_client, AuthContext, EnumerationPolicy, RegistryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = registry_client(
//!         ProviderKind::Quay,
//!         RegistryConfig::new("https://quay.io"),
//!         AuthContext::bearer("token"),
//!     )?;
//!
//!     let tags = client.list_tags("org/app", &EnumerationPolicy::new(10, true)).await?;
//!     println!("{tags}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     TagEnumerator                        │
//! │        (cap = max_tags - 1, latest exclusion)            │
//! └──────────────────────────────────────────────────────────┘
//!                          │ fetch_tag_page
//!                          ▼
//! ┌──────────────────────────┐    ┌──────────────────────────┐
//! │       QuayClient         │    │        AcrClient         │
//! │   page=N, has_additional │    │   Link: <...>; rel=next  │
//! └──────────────────────────┘    └──────────────────────────┘
//!                                              ▲
//!                              CredentialProvider (token exchange)
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod acr;
mod auth;
mod client;
mod config;
mod credentials;
mod enumerator;
mod error;
mod quay;
mod secrets;

pub use acr::AcrClient;
pub use auth::{AuthContext, AuthScheme};
pub use client::{registry_client, PageToken, RegistryClient, TagPage};
pub use config::{RegistryConfig, DEFAULT_PAGE_SIZE};
pub use credentials::{
    AcrTokenExchange, CredentialProvider, IdentityProvider, PlatformToken, ServicePrincipal,
    ServicePrincipalCredentials, TokenExchange, ACR_REFRESH_TOKEN_USER,
};
pub use enumerator::{EnumerationPolicy, TagEnumerator};
pub use error::{RegistryError, Result};
pub use quay::QuayClient;
pub use secrets::SecretStore;
