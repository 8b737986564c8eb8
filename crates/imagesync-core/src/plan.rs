//! Per-repository sync plans and their lifecycle states.

use std::fmt;

use serde::Serialize;

use crate::diff::missing_tags;
use crate::reference::RegistryReference;
use crate::tag::TagSet;

/// Lifecycle of one repository within a sync run.
///
/// ```text
/// Start → SourceEnumerated → DestinationChecked → Diffed → Copying → Done
///   └──────────────┴──────────────┴──────────────┴─────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Nothing has happened yet.
    Start,
    /// Source tags are known.
    SourceEnumerated,
    /// Destination existence and tags are known.
    DestinationChecked,
    /// Missing tags are computed.
    Diffed,
    /// Transfers are being issued.
    Copying,
    /// Every missing tag was copied.
    Done,
    /// A step failed; no further steps run.
    Failed,
}

impl SyncState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns the state that follows a successful step, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::SourceEnumerated),
            Self::SourceEnumerated => Some(Self::DestinationChecked),
            Self::DestinationChecked => Some(Self::Diffed),
            Self::Diffed => Some(Self::Copying),
            Self::Copying => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SourceEnumerated => "source_enumerated",
            Self::DestinationChecked => "destination_checked",
            Self::Diffed => "diffed",
            Self::Copying => "copying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed state for one repository in one run.
///
/// Built fresh each run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Where tags are read from.
    pub source: RegistryReference,
    /// Where missing tags are copied to.
    pub destination: RegistryReference,
    /// Enumerated source tags.
    pub source_tags: TagSet,
    /// Whether the destination repository exists.
    pub destination_exists: bool,
    /// Enumerated destination tags; empty if the repository is absent.
    pub destination_tags: TagSet,
    /// Source tags absent from the destination, in source order.
    pub missing_tags: TagSet,
}

impl SyncPlan {
    /// Builds a plan and computes the missing tags.
    ///
    /// `destination_tags` is `None` when the destination repository does
    /// not exist, in which case every source tag is missing.
    #[must_use]
    pub fn new(
        source: RegistryReference,
        destination: RegistryReference,
        source_tags: TagSet,
        destination_tags: Option<TagSet>,
    ) -> Self {
        let destination_exists = destination_tags.is_some();
        let destination_tags = destination_tags.unwrap_or_default();
        let missing_tags = missing_tags(&source_tags, &destination_tags);

        Self {
            source,
            destination,
            source_tags,
            destination_exists,
            destination_tags,
            missing_tags,
        }
    }

    /// Returns true if nothing needs copying.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.missing_tags.is_empty()
    }
}
