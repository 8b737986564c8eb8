//! Tags command: prints the bounded tag listing of one repository.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use imagesync_core::{is_valid_repository, RegistryEndpoint, SyncConfig, TagSet};
use imagesync_registry::{EnumerationPolicy, SecretStore};

use super::{connect, load_config};

/// Arguments for the tags command.
#[derive(Args)]
pub struct TagsArgs {
    /// Configuration file (YAML, or JSON by extension)
    #[arg(short, long, default_value = "imagesync.yaml", env = "IMAGESYNC_CONFIG")]
    pub config: PathBuf,

    /// Repository path, e.g. org/app
    #[arg(short, long)]
    pub image: String,

    /// List the destination registry instead of the source
    #[arg(long)]
    pub destination: bool,

    /// Print the tags as a JSON array
    #[arg(long)]
    pub json: bool,
}

/// Execute the tags command.
pub async fn execute(args: TagsArgs) -> Result<()> {
    if !is_valid_repository(&args.image) {
        anyhow::bail!("Invalid image path: '{}'", args.image);
    }

    let config = load_config(&args.config)?;
    let endpoint = select_endpoint(&config, args.destination);
    let secrets = SecretStore::from_config(&config.secrets);

    info!(registry = %endpoint.url, image = %args.image, "Listing tags");

    let tags = list(endpoint, &config, &secrets, &args.image).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else {
        for tag in &tags {
            println!("{tag}");
        }
    }
    Ok(())
}

const fn select_endpoint(config: &SyncConfig, destination: bool) -> &RegistryEndpoint {
    if destination {
        &config.destination
    } else {
        &config.source
    }
}

async fn list(
    endpoint: &RegistryEndpoint,
    config: &SyncConfig,
    secrets: &SecretStore,
    image: &str,
) -> Result<TagSet> {
    let endpoint = connect(endpoint, config, secrets).await?;
    let client = endpoint.client();

    // Absent repositories list as empty, matching how sync treats them.
    if !client
        .repository_exists(image)
        .await
        .with_context(|| format!("Failed to check {}/{image}", endpoint.registry()))?
    {
        info!(image, "Repository does not exist");
        return Ok(TagSet::new());
    }

    client
        .list_tags(image, &EnumerationPolicy::from_config(config))
        .await
        .with_context(|| format!("Failed to list tags of {}/{image}", endpoint.registry()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagesync_core::ProviderKind;

    #[test]
    fn test_select_endpoint() {
        let config = SyncConfig::new(
            RegistryEndpoint::new(ProviderKind::Acr, "https://example.azurecr.io"),
            vec!["org/app".to_string()],
        );

        assert_eq!(select_endpoint(&config, false).provider, ProviderKind::Quay);
        assert_eq!(select_endpoint(&config, true).provider, ProviderKind::Acr);
    }

    #[tokio::test]
    async fn test_rejects_invalid_image() {
        let args = TagsArgs {
            config: PathBuf::from("/nonexistent.yaml"),
            image: "org/app with space".to_string(),
            destination: false,
            json: false,
        };
        let err = execute(args).await.unwrap_err();
        assert!(err.to_string().contains("Invalid image path"));
    }
}
