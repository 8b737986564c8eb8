//! imagesync CLI - mirrors recent image tags between container registries.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{Cli, Commands, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "imagesync=info".into()),
    );
    match cli.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args).await,
        Commands::Tags(args) => commands::tags::execute(args).await,
        Commands::Validate(args) => commands::validate::run(&args),
        Commands::Version => {
            println!("imagesync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
