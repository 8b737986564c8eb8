//! Validate command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use imagesync_core::SyncConfig;

use super::load_config;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Configuration file (YAML, or JSON by extension)
    #[arg(short, long, default_value = "imagesync.yaml", env = "IMAGESYNC_CONFIG")]
    pub config: PathBuf,
}

/// Runs the validate command.
pub fn run(args: &ValidateArgs) -> Result<()> {
    info!(path = ?args.config, "Validating configuration");

    let config = load_config(&args.config)?;
    print_summary(&config);

    println!("\n✓ Configuration is valid");
    Ok(())
}

fn print_summary(config: &SyncConfig) {
    println!("imagesync configuration");
    println!("=======================");
    println!(
        "Source:         {} ({})",
        config.source.url,
        config.source.provider.as_str()
    );
    println!(
        "Destination:    {} ({})",
        config.destination.url,
        config.destination.provider.as_str()
    );
    println!("Images:         {}", config.images.len());
    for image in &config.images {
        println!("  - {image}");
    }
    println!("Max tags:       {}", config.max_tags);
    println!("Skip latest:    {}", config.skip_latest);
    println!("Timeout:        {}s", config.request_timeout_seconds);
    println!("Concurrency:    {}", config.concurrency);
    println!("Failure policy: {:?}", config.failure_policy);
    println!("Secrets:        {}", config.secrets.directory.display());
}
