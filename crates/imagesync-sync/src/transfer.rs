//! Image transfer between registries.
//!
//! The orchestrator only decides *what* to copy. Moving manifests and blobs
//! is delegated to an [`ImageTransfer`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use imagesync_core::ImageReference;
use imagesync_registry::{AuthContext, AuthScheme};
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::TransferError;

/// Copies one image from a source to a destination registry.
#[async_trait]
pub trait ImageTransfer: Send + Sync + std::fmt::Debug {
    /// Copies `source` to `destination`.
    ///
    /// Any error is treated as fatal by the caller.
    async fn copy(
        &self,
        destination: &ImageReference,
        source: &ImageReference,
        destination_auth: &AuthContext,
        source_auth: &AuthContext,
    ) -> Result<(), TransferError>;
}

/// Copies images with the `skopeo` command line tool.
#[derive(Debug, Clone)]
pub struct SkopeoTransfer {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl Default for SkopeoTransfer {
    fn default() -> Self {
        Self::new("skopeo")
    }
}

impl SkopeoTransfer {
    /// Creates a transfer running `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Appends an argument passed to `skopeo copy` before the image references.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    fn build_args(
        &self,
        destination: &ImageReference,
        source: &ImageReference,
        destination_creds: &SkopeoCredentials,
        source_creds: &SkopeoCredentials,
    ) -> Vec<String> {
        let mut args = vec!["copy".to_string(), "--all".to_string()];
        args.extend(source_creds.args.iter().cloned());
        args.extend(destination_creds.args.iter().cloned());
        args.extend(self.extra_args.iter().cloned());
        args.push(format!("docker://{source}"));
        args.push(format!("docker://{destination}"));
        args
    }
}

/// `containers-auth.json` document accepted by `--authfile` options.
#[derive(Serialize)]
struct AuthFile<'a> {
    auths: BTreeMap<&'a str, AuthEntry>,
}

#[derive(Serialize)]
struct AuthEntry {
    auth: String,
}

/// Credential arguments for one side of a `skopeo copy`.
///
/// Basic credentials are written to a private auth file that lives as long
/// as this value. Registry tokens have no file form and are passed inline.
struct SkopeoCredentials {
    args: Vec<String>,
    _authfile: Option<NamedTempFile>,
}

impl SkopeoCredentials {
    fn prepare(prefix: &str, registry: &str, auth: &AuthContext) -> Result<Self, TransferError> {
        let inline = |args: Vec<String>| Self {
            args,
            _authfile: None,
        };

        match auth.scheme() {
            AuthScheme::Anonymous => Ok(inline(vec![format!("--{prefix}-no-creds")])),
            AuthScheme::Bearer => Ok(inline(vec![
                format!("--{prefix}-registry-token"),
                auth.expose_secret().to_string(),
            ])),
            AuthScheme::Basic { username } => {
                let file = write_authfile(registry, username, auth.expose_secret())?;
                Ok(Self {
                    args: vec![
                        format!("--{prefix}-authfile"),
                        file.path().display().to_string(),
                    ],
                    _authfile: Some(file),
                })
            }
        }
    }
}

fn write_authfile(
    registry: &str,
    username: &str,
    secret: &str,
) -> Result<NamedTempFile, TransferError> {
    let auth = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{secret}"));
    let document = AuthFile {
        auths: BTreeMap::from([(registry, AuthEntry { auth })]),
    };

    let mut file = tempfile::Builder::new()
        .prefix("imagesync-auth-")
        .suffix(".json")
        .tempfile()
        .map_err(TransferError::Credentials)?;
    serde_json::to_writer(&mut file, &document)
        .map_err(|e| TransferError::Credentials(e.into()))?;
    file.flush().map_err(TransferError::Credentials)?;
    Ok(file)
}

#[async_trait]
impl ImageTransfer for SkopeoTransfer {
    async fn copy(
        &self,
        destination: &ImageReference,
        source: &ImageReference,
        destination_auth: &AuthContext,
        source_auth: &AuthContext,
    ) -> Result<(), TransferError> {
        let source_creds = SkopeoCredentials::prepare("src", &source.registry, source_auth)?;
        let destination_creds =
            SkopeoCredentials::prepare("dest", &destination.registry, destination_auth)?;
        let args = self.build_args(destination, source, &destination_creds, &source_creds);
        debug!(program = %self.program.display(), %source, %destination, "Starting skopeo copy");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransferError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(TransferError::Failed {
            image: destination.to_string(),
            code: output.status.code(),
            stderr: stderr.trim().chars().take(1024).collect(),
        })
    }
}

/// Transfer that copies nothing and records what it would have copied.
#[derive(Debug, Default)]
pub struct DryRunTransfer {
    copies: Mutex<Vec<(ImageReference, ImageReference)>>,
}

impl DryRunTransfer {
    /// Creates a dry-run transfer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(source, destination)` pairs in the order they were requested.
    #[must_use]
    pub fn copies(&self) -> Vec<(ImageReference, ImageReference)> {
        self.copies
            .lock()
            .map(|copies| copies.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageTransfer for DryRunTransfer {
    async fn copy(
        &self,
        destination: &ImageReference,
        source: &ImageReference,
        _destination_auth: &AuthContext,
        _source_auth: &AuthContext,
    ) -> Result<(), TransferError> {
        info!(%source, %destination, "Dry run: skipping copy");
        if let Ok(mut copies) = self.copies.lock() {
            copies.push((source.clone(), destination.clone()));
        }
        Ok(())
    }
}
