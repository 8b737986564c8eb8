//! End-to-end sync scenarios against in-memory registries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use imagesync_core::{FailurePolicy, ImageReference, ProviderKind, SyncState, TagName};
use imagesync_registry::{
    AuthContext, EnumerationPolicy, PageToken, RegistryClient, RegistryError, TagPage,
};
use imagesync_sync::{
    EventDispatcher, ImageTransfer, InMemorySink, SyncEndpoint, SyncError, SyncEventKind,
    SyncOptions, SyncOrchestrator, TransferError,
};
use tokio_util::sync::CancellationToken;

const SOURCE_HOST: &str = "quay.io";
const DESTINATION_HOST: &str = "example.azurecr.io";

/// Registry serving fixed pages per repository.
struct FakeRegistry {
    provider: ProviderKind,
    repositories: HashMap<String, Vec<Vec<&'static str>>>,
    broken: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            repositories: HashMap::new(),
            broken: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_repository(mut self, repository: &str, pages: &[&[&'static str]]) -> Self {
        self.repositories.insert(
            repository.to_string(),
            pages.iter().map(|page| page.to_vec()).collect(),
        );
        self
    }

    /// Every call touching `repository` fails with a transient error.
    fn with_broken(mut self, repository: &str) -> Self {
        self.broken.insert(repository.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_broken(&self, repository: &str) -> imagesync_registry::Result<()> {
        if self.broken.contains(repository) {
            return Err(RegistryError::Transient {
                message: "service unavailable".to_string(),
                status: Some(503),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn fetch_tag_page(
        &self,
        repository: &str,
        token: Option<&PageToken>,
    ) -> imagesync_registry::Result<TagPage> {
        self.record(format!("list:{repository}"));
        self.check_broken(repository)?;

        let pages = self
            .repositories
            .get(repository)
            .ok_or_else(|| RegistryError::NotFound {
                repository: repository.to_string(),
            })?;
        let index: usize = token.map_or(0, |t| t.as_str().parse().unwrap());
        let tags = pages
            .get(index)
            .map(|page| page.iter().map(|t| TagName::new(*t)).collect())
            .unwrap_or_default();
        let next = (index + 1 < pages.len()).then(|| PageToken::new((index + 1).to_string()));
        Ok(TagPage::new(tags, next))
    }

    async fn repository_exists(&self, repository: &str) -> imagesync_registry::Result<bool> {
        self.record(format!("exists:{repository}"));
        self.check_broken(repository)?;
        Ok(self.repositories.contains_key(repository))
    }
}

/// Transfer that records copies and can fail or hang on request.
#[derive(Debug, Default)]
struct RecordingTransfer {
    copies: Mutex<Vec<String>>,
    fail_on: Option<String>,
    cancel_on_copy: Option<CancellationToken>,
}

impl RecordingTransfer {
    fn failing_on(tag: &str) -> Self {
        Self {
            fail_on: Some(tag.to_string()),
            ..Self::default()
        }
    }

    fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_copy: Some(token),
            ..Self::default()
        }
    }

    fn copies(&self) -> Vec<String> {
        self.copies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageTransfer for RecordingTransfer {
    async fn copy(
        &self,
        destination: &ImageReference,
        source: &ImageReference,
        _destination_auth: &AuthContext,
        _source_auth: &AuthContext,
    ) -> Result<(), TransferError> {
        if let Some(token) = &self.cancel_on_copy {
            token.cancel();
            std::future::pending::<()>().await;
        }
        if self.fail_on.as_deref() == Some(source.tag.as_str()) {
            return Err(TransferError::Other(format!("manifest unknown: {source}")));
        }
        self.copies
            .lock()
            .unwrap()
            .push(format!("{source} -> {destination}"));
        Ok(())
    }
}

struct Harness {
    source: Arc<FakeRegistry>,
    destination: Arc<FakeRegistry>,
    transfer: Arc<RecordingTransfer>,
    sink: Arc<InMemorySink>,
    orchestrator: SyncOrchestrator,
}

fn harness(
    source: FakeRegistry,
    destination: FakeRegistry,
    transfer: RecordingTransfer,
    options: SyncOptions,
) -> Harness {
    let source = Arc::new(source);
    let destination = Arc::new(destination);
    let transfer = Arc::new(transfer);
    let sink = Arc::new(InMemorySink::new());

    let orchestrator = SyncOrchestrator::new(
        SyncEndpoint::new(source.clone(), SOURCE_HOST, AuthContext::bearer("quay-token")),
        SyncEndpoint::new(
            destination.clone(),
            DESTINATION_HOST,
            AuthContext::basic("00000000-0000-0000-0000-000000000000", "refresh"),
        ),
        transfer.clone(),
    )
    .with_options(options)
    .with_events(EventDispatcher::new().with_sink(sink.clone()));

    Harness {
        source,
        destination,
        transfer,
        sink,
        orchestrator,
    }
}

fn options(max_tags: usize) -> SyncOptions {
    SyncOptions {
        policy: EnumerationPolicy::new(max_tags, true),
        ..SyncOptions::default()
    }
}

fn quay() -> FakeRegistry {
    FakeRegistry::new(ProviderKind::Quay)
}

fn acr() -> FakeRegistry {
    FakeRegistry::new(ProviderKind::Acr)
}

fn copy_line(repository: &str, tag: &str) -> String {
    format!("{SOURCE_HOST}/{repository}:{tag} -> {DESTINATION_HOST}/{repository}:{tag}")
}

fn images(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

// =============================================================================
// Single repository
// =============================================================================

#[tokio::test]
async fn test_absent_destination_copies_capped_source_tags() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2", "v1", "latest"]]),
        acr(),
        RecordingTransfer::default(),
        options(3),
    );

    let outcome = h.orchestrator.sync_repository("org/app").await.unwrap();

    assert_eq!(
        h.transfer.copies(),
        vec![copy_line("org/app", "v3"), copy_line("org/app", "v2")]
    );
    assert!(!outcome.plan.destination_exists);
    assert_eq!(outcome.copied, vec![TagName::new("v3"), TagName::new("v2")]);
    // No tag listing against a repository that does not exist.
    assert_eq!(h.destination.calls(), vec!["exists:org/app"]);
}

#[tokio::test]
async fn test_existing_destination_copies_only_missing() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2", "v1", "latest"]]),
        acr().with_repository("org/app", &[&["v2"]]),
        RecordingTransfer::default(),
        options(3),
    );

    let outcome = h.orchestrator.sync_repository("org/app").await.unwrap();

    assert_eq!(h.transfer.copies(), vec![copy_line("org/app", "v3")]);
    assert!(outcome.plan.destination_exists);
    assert_eq!(
        h.destination.calls(),
        vec!["exists:org/app", "list:org/app"]
    );
}

#[tokio::test]
async fn test_up_to_date_repository_copies_nothing() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2"]]),
        acr().with_repository("org/app", &[&["v3", "v2"]]),
        RecordingTransfer::default(),
        options(10),
    );

    let outcome = h.orchestrator.sync_repository("org/app").await.unwrap();

    assert!(outcome.plan.is_up_to_date());
    assert!(h.transfer.copies().is_empty());
    assert_eq!(
        h.sink.kinds_for("org/app").last(),
        Some(&SyncEventKind::Completed { copied: 0 })
    );
}

#[tokio::test]
async fn test_source_paging_excludes_latest_before_cap() {
    let h = harness(
        quay().with_repository("org/app", &[&["latest", "v5"], &["v4", "v3"], &["v2"]]),
        acr(),
        RecordingTransfer::default(),
        options(4),
    );

    h.orchestrator.sync_repository("org/app").await.unwrap();

    assert_eq!(
        h.transfer.copies(),
        vec![
            copy_line("org/app", "v5"),
            copy_line("org/app", "v4"),
            copy_line("org/app", "v3"),
        ]
    );
    // The third page is never requested.
    assert_eq!(h.source.calls(), vec!["list:org/app", "list:org/app"]);
}

#[tokio::test]
async fn test_cap_of_one_syncs_nothing() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2"]]),
        acr(),
        RecordingTransfer::default(),
        options(1),
    );

    let outcome = h.orchestrator.sync_repository("org/app").await.unwrap();

    assert!(outcome.plan.source_tags.is_empty());
    assert!(h.source.calls().is_empty());
    assert!(h.transfer.copies().is_empty());
}

#[tokio::test]
async fn test_plan_does_not_copy() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2", "v1"]]),
        acr().with_repository("org/app", &[&["v1"]]),
        RecordingTransfer::default(),
        options(10),
    );

    let plan = h.orchestrator.plan("org/app").await.unwrap();

    let missing: Vec<&str> = plan.missing_tags.iter().map(TagName::as_str).collect();
    assert_eq!(missing, vec!["v3", "v2"]);
    assert!(h.transfer.copies().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_source_not_found_is_registry_error() {
    let h = harness(quay(), acr(), RecordingTransfer::default(), options(10));

    let err = h.orchestrator.sync_repository("org/missing").await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Registry {
            state: SyncState::Start,
            source: RegistryError::NotFound { .. },
            ..
        }
    ));
    assert!(h.destination.calls().is_empty());
}

#[tokio::test]
async fn test_destination_check_failure_aborts_before_copy() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2"]]),
        acr().with_broken("org/app"),
        RecordingTransfer::default(),
        options(10),
    );

    let err = h.orchestrator.sync_repository("org/app").await.unwrap_err();

    match err {
        SyncError::Registry { state, source, .. } => {
            assert_eq!(state, SyncState::SourceEnumerated);
            assert!(source.is_retryable());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.transfer.copies().is_empty());

    let kinds = h.sink.kinds_for("org/app");
    assert!(matches!(
        kinds.last(),
        Some(SyncEventKind::Failed {
            state: SyncState::SourceEnumerated,
            ..
        })
    ));
}

#[tokio::test]
async fn test_transfer_failure_stops_remaining_copies() {
    let h = harness(
        quay().with_repository("org/app", &[&["v3", "v2", "v1"]]),
        acr(),
        RecordingTransfer::failing_on("v2"),
        options(10),
    );

    let err = h.orchestrator.sync_repository("org/app").await.unwrap_err();

    assert!(matches!(err, SyncError::Transfer { .. }));
    assert_eq!(err.repository(), Some("org/app"));
    // v3 stays copied, v1 is never attempted.
    assert_eq!(h.transfer.copies(), vec![copy_line("org/app", "v3")]);
}

// =============================================================================
// Runs
// =============================================================================

#[tokio::test]
async fn test_run_processes_images_in_order() {
    let h = harness(
        quay()
            .with_repository("org/a", &[&["v1"]])
            .with_repository("org/b", &[&["v2"]]),
        acr(),
        RecordingTransfer::default(),
        options(10),
    );

    let report = h.orchestrator.run(&images(&["org/a", "org/b"])).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.copied_count(), 2);
    assert_eq!(
        h.transfer.copies(),
        vec![copy_line("org/a", "v1"), copy_line("org/b", "v2")]
    );
}

#[tokio::test]
async fn test_fail_fast_skips_later_images() {
    let h = harness(
        quay()
            .with_repository("org/a", &[&["v1"]])
            .with_repository("org/b", &[&["v1"]])
            .with_repository("org/c", &[&["v1"]]),
        acr().with_broken("org/b"),
        RecordingTransfer::default(),
        options(10),
    );

    let err = h
        .orchestrator
        .run(&images(&["org/a", "org/b", "org/c"]))
        .await
        .unwrap_err();

    assert_eq!(err.repository(), Some("org/b"));
    assert_eq!(h.transfer.copies(), vec![copy_line("org/a", "v1")]);
    assert!(h.sink.kinds_for("org/c").is_empty());
}

#[tokio::test]
async fn test_isolate_continues_past_failures() {
    let h = harness(
        quay()
            .with_repository("org/a", &[&["v1"]])
            .with_repository("org/b", &[&["v1"]])
            .with_repository("org/c", &[&["v1"]]),
        acr().with_broken("org/b"),
        RecordingTransfer::default(),
        SyncOptions {
            failure_policy: FailurePolicy::Isolate,
            ..options(10)
        },
    );

    let report = h
        .orchestrator
        .run(&images(&["org/a", "org/b", "org/c"]))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].repository(), Some("org/b"));
    assert_eq!(
        h.transfer.copies(),
        vec![copy_line("org/a", "v1"), copy_line("org/c", "v1")]
    );

    match report.into_result() {
        Err(SyncError::Failures { failures, total }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_run_reports_in_image_order() {
    let names = ["org/a", "org/b", "org/c", "org/d"];
    let mut source = quay();
    for name in names {
        source = source.with_repository(name, &[&["v2", "v1"]]);
    }
    let h = harness(
        source,
        acr(),
        RecordingTransfer::default(),
        SyncOptions {
            concurrency: 3,
            ..options(10)
        },
    );

    let report = h.orchestrator.run(&images(&names)).await.unwrap();

    let order: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.plan.source.repository.as_str())
        .collect();
    assert_eq!(order, names);
    assert_eq!(h.transfer.copies().len(), 8);
}

#[tokio::test]
async fn test_cancellation_interrupts_copy() {
    let token = CancellationToken::new();
    let h = harness(
        quay().with_repository("org/app", &[&["v2", "v1"]]),
        acr(),
        RecordingTransfer::cancelling(token.clone()),
        options(10),
    );
    let orchestrator = h.orchestrator.with_cancellation(token);

    let err = orchestrator.run(&images(&["org/app"])).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(h.transfer.copies().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let h = harness(
        quay().with_repository("org/app", &[&["v1"]]),
        acr(),
        RecordingTransfer::default(),
        options(10),
    );
    let orchestrator = h.orchestrator.with_cancellation(token);

    let err = orchestrator.run(&images(&["org/app"])).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(h.source.calls().is_empty());
    assert!(h.destination.calls().is_empty());
}
