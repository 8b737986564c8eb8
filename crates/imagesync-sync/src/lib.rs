//! Sync orchestration for imagesync.
//!
//! This crate turns two registry clients and an image transfer into a
//! sync run:
//! - Enumerate bounded source tags
//! - Check and enumerate the destination repository
//! - Copy the missing tags, in source order
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use imagesync_core::ProviderKind;
//! use imagesync_registry::{registry_client, AuthContext, RegistryConfig};
//! use imagesync_sync::{DryRunTransfer, SyncEndpoint, SyncOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source_auth = AuthContext::bearer("token");
//! let destination_auth = AuthContext::basic("00000000-0000-0000-0000-000000000000", "refresh");
//!
//! let source = registry_client(
//!     ProviderKind::Quay,
//!     RegistryConfig::new("https://quay.io"),
//!     source_auth.clone(),
//! )?;
//! let destination = registry_client(
//!     ProviderKind::Acr,
//!     RegistryConfig::new("https://example.azurecr.io"),
//!     destination_auth.clone(),
//! )?;
//!
//! let orchestrator = SyncOrchestrator::new(
//!     SyncEndpoint::new(source, "quay.io", source_auth),
//!     SyncEndpoint::new(destination, "example.azurecr.io", destination_auth),
//!     Arc::new(DryRunTransfer::new()),
//! );
//!
//! let report = orchestrator.run(&["org/app".to_string()]).await?;
//! println!("copied {} tags", report.copied_count());
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod orchestrator;
mod transfer;

pub use error::{Result, SyncError, TransferError};
pub use events::{
    EventDispatcher, EventSink, InMemorySink, SyncEvent, SyncEventKind, TracingSink,
};
pub use orchestrator::{
    RepositoryOutcome, SyncEndpoint, SyncOptions, SyncOrchestrator, SyncReport,
};
pub use transfer::{DryRunTransfer, ImageTransfer, SkopeoTransfer};
