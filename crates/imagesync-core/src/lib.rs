//! # imagesync core
//!
//! Core types for mirroring container image tags between registries.
//!
//! This crate holds everything that does not touch the network:
//!
//! - [`TagName`] and [`TagSet`] - tags in provider-reported order
//! - [`RegistryReference`] and [`ImageReference`] - where tags live
//! - [`missing_tags`] - the tag diff driving copy decisions
//! - [`SyncPlan`] and [`SyncState`] - per-repository run state
//! - [`SyncConfig`] - run configuration loaded from YAML or JSON
//!
//! ## Example
//!
//! ```rust
//! use imagesync_core::{ProviderKind, RegistryReference, SyncPlan, TagSet};
//!
//! let source = RegistryReference::new(ProviderKind::Quay, "quay.io", "org/app")?;
//! let destination = RegistryReference::new(ProviderKind::Acr, "example.azurecr.io", "org/app")?;
//!
//! let source_tags: TagSet = ["v3", "v2"].into_iter().collect();
//! let destination_tags: TagSet = ["v2"].into_iter().collect();
//!
//! let plan = SyncPlan::new(source, destination, source_tags, Some(destination_tags));
//! assert_eq!(plan.missing_tags.to_string(), "[v3]");
//! # Ok::<(), imagesync_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod diff;
pub mod error;
pub mod plan;
pub mod reference;
pub mod tag;


pub use config::{FailurePolicy, RegistryEndpoint, SecretsConfig, SyncConfig};
pub use diff::missing_tags;
pub use error::{Error, Result};
pub use plan::{SyncPlan, SyncState};
pub use reference::{is_valid_repository, ImageReference, ProviderKind, RegistryReference};
pub use tag::{TagName, TagSet, LATEST_TAG};
