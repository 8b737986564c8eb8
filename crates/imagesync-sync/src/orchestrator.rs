//! Sync orchestration.
//!
//! For each repository the orchestrator walks a fixed sequence of states:
//!
//! ```text
//! Start ─▶ SourceEnumerated ─▶ DestinationChecked ─▶ Diffed ─▶ Copying ─▶ Done
//! ```
//!
//! Any error moves the repository to `Failed`. Under
//! [`FailurePolicy::FailFast`] that also ends the run and no further copy
//! is started; under [`FailurePolicy::Isolate`] the remaining repositories
//! still run. Already-copied tags are never rolled back.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use imagesync_core::{
    FailurePolicy, ProviderKind, RegistryReference, SyncConfig, SyncPlan, SyncState, TagName,
};
use imagesync_registry::{AuthContext, EnumerationPolicy, RegistryClient, TagEnumerator};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::events::{EventDispatcher, SyncEventKind};
use crate::transfer::ImageTransfer;

/// One side of a sync: a registry, its client and its credentials.
#[derive(Clone)]
pub struct SyncEndpoint {
    client: Arc<dyn RegistryClient>,
    registry: String,
    auth: AuthContext,
}

impl SyncEndpoint {
    /// Creates an endpoint for the registry host `registry`.
    #[must_use]
    pub fn new(
        client: Arc<dyn RegistryClient>,
        registry: impl Into<String>,
        auth: AuthContext,
    ) -> Self {
        Self {
            client,
            registry: registry.into(),
            auth,
        }
    }

    /// Returns the provider behind this endpoint.
    #[must_use]
    pub fn provider(&self) -> ProviderKind {
        self.client.provider()
    }

    /// Returns the registry host.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Returns the registry client.
    #[must_use]
    pub fn client(&self) -> &dyn RegistryClient {
        self.client.as_ref()
    }

    fn reference(&self, repository: &str) -> Result<RegistryReference> {
        RegistryReference::new(self.provider(), &self.registry, repository).map_err(|e| {
            SyncError::registry(
                repository,
                SyncState::Start,
                imagesync_registry::RegistryError::InvalidConfig {
                    message: e.to_string(),
                },
            )
        })
    }
}

impl std::fmt::Debug for SyncEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEndpoint")
            .field("provider", &self.provider())
            .field("registry", &self.registry)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Tunables for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Tag cap and exclusion rules.
    pub policy: EnumerationPolicy,
    /// Number of repositories synced at once.
    pub concurrency: usize,
    /// Failure handling across repositories.
    pub failure_policy: FailurePolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: EnumerationPolicy::default(),
            concurrency: 1,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl SyncOptions {
    /// Creates options from run configuration.
    #[must_use]
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self {
            policy: EnumerationPolicy::from_config(config),
            concurrency: config.concurrency,
            failure_policy: config.failure_policy,
        }
    }
}

/// Result of syncing one repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryOutcome {
    /// The computed plan.
    pub plan: SyncPlan,
    /// Tags copied, in copy order.
    pub copied: Vec<TagName>,
}

/// Summary of a sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Successful repositories, in image order.
    pub outcomes: Vec<RepositoryOutcome>,
    /// Failed repositories, in image order. Only populated when isolating.
    pub failures: Vec<SyncError>,
}

impl SyncReport {
    /// Returns the total number of tags copied.
    #[must_use]
    pub fn copied_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.copied.len()).sum()
    }

    /// Returns true if no repository failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns recorded failures into [`SyncError::Failures`].
    ///
    /// # Errors
    ///
    /// Returns the aggregate error if any repository failed.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let total = self.outcomes.len() + self.failures.len();
        Err(SyncError::Failures {
            failures: self.failures,
            total,
        })
    }
}

/// Drives sync runs across repositories.
#[derive(Debug)]
pub struct SyncOrchestrator {
    source: SyncEndpoint,
    destination: SyncEndpoint,
    transfer: Arc<dyn ImageTransfer>,
    events: EventDispatcher,
    options: SyncOptions,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with default options and no event sinks.
    #[must_use]
    pub fn new(
        source: SyncEndpoint,
        destination: SyncEndpoint,
        transfer: Arc<dyn ImageTransfer>,
    ) -> Self {
        Self {
            source,
            destination,
            transfer,
            events: EventDispatcher::new(),
            options: SyncOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the run options.
    #[must_use]
    pub const fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the event dispatcher.
    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Aborts work between and during steps once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the run options.
    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Syncs every image in `images`.
    ///
    /// Up to `concurrency` repositories run at once. With one, images are
    /// processed strictly in order.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::FailFast`] the first repository error is
    /// returned and in-flight repositories are abandoned. Under
    /// [`FailurePolicy::Isolate`] only cancellation is returned as an
    /// error; repository failures are collected in the report.
    pub async fn run(&self, images: &[String]) -> Result<SyncReport> {
        let concurrency = self.options.concurrency.max(1);
        info!(
            images = images.len(),
            concurrency,
            max_tags = self.options.policy.max_tags,
            skip_latest = self.options.policy.skip_latest,
            "Starting sync run"
        );

        let mut results = stream::iter(images.iter().enumerate())
            .map(|(index, image)| async move { (index, self.sync_repository(image).await) })
            .buffer_unordered(concurrency);

        let mut outcomes = Vec::with_capacity(images.len());
        let mut failures = Vec::new();

        while let Some((index, result)) = results.next().await {
            match result {
                Ok(outcome) => outcomes.push((index, outcome)),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::FailFast => {
                        warn!(error = %e, "Aborting sync run");
                        return Err(e);
                    }
                    FailurePolicy::Isolate => {
                        warn!(error = %e, "Repository failed, continuing");
                        failures.push((index, e));
                    }
                },
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        failures.sort_by_key(|(index, _)| *index);

        let report = SyncReport {
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
            failures: failures.into_iter().map(|(_, e)| e).collect(),
        };

        info!(
            synced = report.outcomes.len(),
            failed = report.failures.len(),
            copied = report.copied_count(),
            "Sync run finished"
        );
        Ok(report)
    }

    /// Plans and copies one repository.
    ///
    /// # Errors
    ///
    /// Returns the first registry or transfer error, or
    /// [`SyncError::Cancelled`].
    pub async fn sync_repository(&self, repository: &str) -> Result<RepositoryOutcome> {
        let result = self.sync_repository_inner(repository).await;
        if let Err((state, e)) = &result {
            self.events.emit(
                repository,
                SyncEventKind::Failed {
                    state: *state,
                    error: e.to_string(),
                },
            );
        }
        result.map_err(|(_, e)| e)
    }

    /// Computes the plan for one repository without copying anything.
    ///
    /// # Errors
    ///
    /// Returns the first registry error, or [`SyncError::Cancelled`].
    pub async fn plan(&self, repository: &str) -> Result<SyncPlan> {
        self.plan_inner(repository).await.map_err(|(_, e)| e)
    }

    async fn sync_repository_inner(
        &self,
        repository: &str,
    ) -> std::result::Result<RepositoryOutcome, (SyncState, SyncError)> {
        let plan = self.plan_inner(repository).await?;

        if plan.is_up_to_date() {
            debug!(repository, "Nothing to copy");
        }
        let state = SyncState::Copying;

        let mut copied = Vec::with_capacity(plan.missing_tags.len());
        for tag in &plan.missing_tags {
            let source = plan.source.image(tag);
            let destination = plan.destination.image(tag);

            self.events.emit(
                repository,
                SyncEventKind::CopyStarted {
                    tag: tag.clone(),
                    source: source.to_string(),
                    destination: destination.to_string(),
                },
            );

            let copy = self.transfer.copy(
                &destination,
                &source,
                &self.destination.auth,
                &self.source.auth,
            );
            self.cancellable(copy)
                .await
                .map_err(|e| (state, e))?
                .map_err(|e| {
                    (
                        state,
                        SyncError::Transfer {
                            repository: repository.to_string(),
                            image: destination.to_string(),
                            source: e,
                        },
                    )
                })?;

            self.events
                .emit(repository, SyncEventKind::CopyCompleted { tag: tag.clone() });
            copied.push(tag.clone());
        }

        self.events.emit(
            repository,
            SyncEventKind::Completed {
                copied: copied.len(),
            },
        );
        Ok(RepositoryOutcome { plan, copied })
    }

    async fn plan_inner(
        &self,
        repository: &str,
    ) -> std::result::Result<SyncPlan, (SyncState, SyncError)> {
        let mut state = SyncState::Start;
        let fail = |state: SyncState, e: imagesync_registry::RegistryError| {
            (state, SyncError::registry(repository, state, e))
        };

        let source_ref = self.source.reference(repository).map_err(|e| (state, e))?;
        let destination_ref = self.destination.reference(repository).map_err(|e| (state, e))?;
        let enumerator =
            TagEnumerator::new(self.options.policy).with_cancellation(self.cancel.clone());

        self.ensure_active().map_err(|e| (state, e))?;
        let source_tags = enumerator
            .enumerate(self.source.client.as_ref(), repository)
            .await
            .map_err(|e| fail(state, e))?;
        state = SyncState::SourceEnumerated;
        self.events.emit(
            repository,
            SyncEventKind::SourceEnumerated {
                tags: source_tags.clone(),
            },
        );

        self.ensure_active().map_err(|e| (state, e))?;
        let exists = self
            .cancellable(self.destination.client.repository_exists(repository))
            .await
            .map_err(|e| (state, e))?
            .map_err(|e| fail(state, e))?;
        self.events
            .emit(repository, SyncEventKind::DestinationChecked { exists });

        let destination_tags = if exists {
            let tags = enumerator
                .enumerate(self.destination.client.as_ref(), repository)
                .await
                .map_err(|e| fail(state, e))?;
            self.events.emit(
                repository,
                SyncEventKind::DestinationEnumerated { tags: tags.clone() },
            );
            Some(tags)
        } else {
            None
        };
        state = SyncState::DestinationChecked;

        self.ensure_active().map_err(|e| (state, e))?;
        let plan = SyncPlan::new(source_ref, destination_ref, source_tags, destination_tags);
        self.events.emit(
            repository,
            SyncEventKind::Diffed {
                missing: plan.missing_tags.clone(),
            },
        );

        Ok(plan)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SyncError::Cancelled),
            output = fut => Ok(output),
        }
    }
}
