//! Sync run events.
//!
//! The orchestrator reports every state transition as a [`SyncEvent`].
//! Events are advisory: sinks cannot fail a run.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use imagesync_core::{SyncState, TagName, TagSet};
use serde::Serialize;
use tracing::{info, warn};
use uuid::{Timestamp, Uuid};

/// Generates a new v7 UUID for sync events.
fn new_event_id() -> Uuid {
    let ts = Timestamp::now(uuid::NoContext);
    Uuid::new_v7(ts)
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEventKind {
    /// Source tags were listed.
    SourceEnumerated {
        /// Enumerated tags.
        tags: TagSet,
    },
    /// Destination existence was checked.
    DestinationChecked {
        /// Whether the destination repository exists.
        exists: bool,
    },
    /// Destination tags were listed.
    DestinationEnumerated {
        /// Enumerated tags.
        tags: TagSet,
    },
    /// Missing tags were computed.
    Diffed {
        /// Tags to copy.
        missing: TagSet,
    },
    /// A copy is about to start.
    CopyStarted {
        /// Tag being copied.
        tag: TagName,
        /// Source image reference.
        source: String,
        /// Destination image reference.
        destination: String,
    },
    /// A copy finished.
    CopyCompleted {
        /// Tag that was copied.
        tag: TagName,
    },
    /// Every missing tag was copied.
    Completed {
        /// Number of tags copied.
        copied: usize,
    },
    /// The repository failed.
    Failed {
        /// Last state reached.
        state: SyncState,
        /// Error description.
        error: String,
    },
}

/// A single event for one repository.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Repository path.
    pub repository: String,
    /// Event details.
    #[serde(flatten)]
    pub kind: SyncEventKind,
}

impl SyncEvent {
    /// Creates an event stamped now.
    #[must_use]
    pub fn new(repository: impl Into<String>, kind: SyncEventKind) -> Self {
        Self {
            id: new_event_id(),
            timestamp: Utc::now(),
            repository: repository.into(),
            kind,
        }
    }

    /// Returns true for failure events.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.kind, SyncEventKind::Failed { .. })
    }
}

/// Receiver of sync events.
pub trait EventSink: Send + Sync + Debug {
    /// Handles one event.
    fn emit(&self, event: &SyncEvent);

    /// Returns the sink name for identification.
    fn name(&self) -> &'static str;
}

/// Fans events out to every configured sink.
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Returns the number of sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Sends an event for `repository` to every sink.
    pub fn emit(&self, repository: &str, kind: SyncEventKind) {
        if self.sinks.is_empty() {
            return;
        }
        let event = SyncEvent::new(repository, kind);
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }
}

/// Sink that logs events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        let repository = event.repository.as_str();
        match &event.kind {
            SyncEventKind::SourceEnumerated { tags } => {
                info!(repository, count = tags.len(), tags = %tags, "Source tags retrieved");
            }
            SyncEventKind::DestinationChecked { exists } => {
                info!(repository, exists, "Destination repository checked");
            }
            SyncEventKind::DestinationEnumerated { tags } => {
                info!(repository, count = tags.len(), tags = %tags, "Destination tags retrieved");
            }
            SyncEventKind::Diffed { missing } => {
                info!(
                    repository,
                    count = missing.len(),
                    missing = %missing,
                    "Computed missing tags"
                );
            }
            SyncEventKind::CopyStarted {
                tag,
                source,
                destination,
            } => {
                info!(repository, %tag, %source, %destination, "Copying image");
            }
            SyncEventKind::CopyCompleted { tag } => {
                info!(repository, %tag, "Copied image");
            }
            SyncEventKind::Completed { copied } => {
                info!(repository, copied, "Repository in sync");
            }
            SyncEventKind::Failed { state, error } => {
                warn!(repository, %state, %error, "Repository sync failed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// In-memory sink for testing.
#[derive(Debug, Default)]
pub struct InMemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl InMemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns the recorded event kinds for `repository`.
    #[must_use]
    pub fn kinds_for(&self, repository: &str) -> Vec<SyncEventKind> {
        self.events()
            .into_iter()
            .filter(|e| e.repository == repository)
            .map(|e| e.kind)
            .collect()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventSink for InMemorySink {
    fn emit(&self, event: &SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
