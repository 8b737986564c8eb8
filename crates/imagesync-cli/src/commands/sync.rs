//! Sync command: copies missing tags for every configured image.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use imagesync_core::{FailurePolicy, SyncConfig};
use imagesync_registry::SecretStore;
use imagesync_sync::{
    DryRunTransfer, EventDispatcher, ImageTransfer, SkopeoTransfer, SyncEndpoint, SyncError,
    SyncOptions, SyncOrchestrator, SyncReport, TracingSink,
};

use super::{connect, load_config};

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    /// Configuration file (YAML, or JSON by extension)
    #[arg(short, long, default_value = "imagesync.yaml", env = "IMAGESYNC_CONFIG")]
    pub config: PathBuf,

    /// Compute plans without copying any image
    #[arg(long, env = "IMAGESYNC_DRY_RUN")]
    pub dry_run: bool,

    /// Override the tag cap (at most max-tags - 1 tags are considered)
    #[arg(long, env = "IMAGESYNC_MAX_TAGS")]
    pub max_tags: Option<usize>,

    /// Override the number of repositories synced at once
    #[arg(long, env = "IMAGESYNC_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Override failure handling across repositories
    #[arg(long, value_enum, env = "IMAGESYNC_FAILURE_POLICY")]
    pub failure_policy: Option<FailurePolicyArg>,

    /// Path to the skopeo binary
    #[arg(long, default_value = "skopeo", env = "IMAGESYNC_SKOPEO")]
    pub skopeo: PathBuf,
}

/// Failure policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicyArg {
    /// Stop at the first failing repository
    FailFast,
    /// Keep going and report every failure at the end
    Isolate,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::FailFast => Self::FailFast,
            FailurePolicyArg::Isolate => Self::Isolate,
        }
    }
}

/// Execute the sync command.
pub async fn execute(args: SyncArgs) -> Result<()> {
    let config = apply_overrides(load_config(&args.config)?, &args)?;
    let secrets = SecretStore::from_config(&config.secrets);

    info!(
        config = %args.config.display(),
        images = config.images.len(),
        dry_run = args.dry_run,
        "Starting imagesync"
    );

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    let (source, destination) = tokio::select! {
        () = cancel.cancelled() => return Err(SyncError::Cancelled.into()),
        endpoints = connect_endpoints(&config, &secrets) => endpoints?,
    };

    let transfer: Arc<dyn ImageTransfer> = if args.dry_run {
        Arc::new(DryRunTransfer::new())
    } else {
        Arc::new(SkopeoTransfer::new(&args.skopeo))
    };

    let orchestrator = SyncOrchestrator::new(source, destination, transfer)
        .with_options(SyncOptions::from_config(&config))
        .with_events(EventDispatcher::new().with_sink(Arc::new(TracingSink::new())))
        .with_cancellation(cancel);

    let report = orchestrator.run(&config.images).await?;
    print_report(&report, args.dry_run);
    report.into_result()?;
    Ok(())
}

async fn connect_endpoints(
    config: &SyncConfig,
    secrets: &SecretStore,
) -> Result<(SyncEndpoint, SyncEndpoint)> {
    let source = connect(&config.source, config, secrets)
        .await
        .context("Failed to set up source registry")?;
    let destination = connect(&config.destination, config, secrets)
        .await
        .context("Failed to set up destination registry")?;
    Ok((source, destination))
}

fn apply_overrides(mut config: SyncConfig, args: &SyncArgs) -> Result<SyncConfig> {
    if let Some(max_tags) = args.max_tags {
        config.max_tags = max_tags;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy.into();
    }
    config.validate().context("Invalid command line overrides")?;
    Ok(config)
}

fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling sync");
            cancel.cancel();
        }
    });
}

fn print_report(report: &SyncReport, dry_run: bool) {
    let verb = if dry_run { "would copy" } else { "copied" };
    for outcome in &report.outcomes {
        let plan = &outcome.plan;
        println!(
            "{}: {verb} {} tag(s) {}",
            plan.destination,
            plan.missing_tags.len(),
            plan.missing_tags
        );
    }
    for failure in &report.failures {
        println!("✗ {failure}");
    }
    println!(
        "\n{} repositories synced, {} failed, {} tag(s) {verb}",
        report.outcomes.len(),
        report.failures.len(),
        report.copied_count()
    );
}
