//! CLI commands and argument parsing.

pub mod sync;
pub mod tags;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use imagesync_core::{ProviderKind, RegistryEndpoint, SyncConfig};
use imagesync_registry::{
    registry_client, AcrTokenExchange, AuthContext, CredentialProvider, RegistryConfig,
    SecretStore, ServicePrincipal,
};
use imagesync_sync::{SyncEndpoint, SyncError};

/// imagesync - mirror recent image tags from one registry to another
#[derive(Parser)]
#[command(name = "imagesync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "IMAGESYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Copy missing tags for every configured image
    Sync(sync::SyncArgs),

    /// List the tags of one repository
    Tags(tags::TagsArgs),

    /// Validate a configuration file
    Validate(validate::ValidateArgs),

    /// Print version information
    Version,
}

/// Loads a configuration file.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    SyncConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Obtains credentials for `endpoint` from the secret store.
pub async fn authenticate(
    endpoint: &RegistryEndpoint,
    config: &SyncConfig,
    secrets: &SecretStore,
) -> Result<AuthContext> {
    let host = endpoint.host()?;
    let auth = provider_auth(endpoint, &host, config, secrets)
        .await
        .map_err(|source| SyncError::Authentication {
            registry: host.clone(),
            source,
        })?;
    debug!(registry = %host, scheme = ?auth.scheme(), "Authenticated");
    Ok(auth)
}

/// Quay uses the stored bearer token. ACR exchanges a service principal
/// identity for a registry refresh token.
async fn provider_auth(
    endpoint: &RegistryEndpoint,
    host: &str,
    config: &SyncConfig,
    secrets: &SecretStore,
) -> imagesync_registry::Result<AuthContext> {
    match endpoint.provider {
        ProviderKind::Quay => secrets.bearer_token(&config.secrets.source_token_file),
        ProviderKind::Acr => {
            let credentials = secrets.service_principal(&config.secrets.identity_file)?;
            let identity = ServicePrincipal::new(credentials, config.request_timeout())?;
            let exchange =
                AcrTokenExchange::new(&RegistryConfig::for_endpoint(endpoint, config), host)?;
            CredentialProvider::new(Arc::new(identity), Arc::new(exchange))
                .authenticate()
                .await
        }
    }
}

/// Builds an authenticated endpoint for `endpoint`.
pub async fn connect(
    endpoint: &RegistryEndpoint,
    config: &SyncConfig,
    secrets: &SecretStore,
) -> Result<SyncEndpoint> {
    let host = endpoint.host()?;
    let auth = authenticate(endpoint, config, secrets).await?;
    let client = registry_client(
        endpoint.provider,
        RegistryConfig::for_endpoint(endpoint, config),
        auth.clone(),
    )
    .with_context(|| format!("Failed to create client for {host}"))?;

    Ok(SyncEndpoint::new(client, host, auth))
}
