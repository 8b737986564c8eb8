//! Tag set difference.
//!
//! The diff is a pure function: given what the source has and what the
//! destination already holds, it yields the tags still to be copied.

use std::collections::HashSet;

use crate::tag::{TagName, TagSet};

/// Returns the tags of `source` that have no equal in `destination`.
///
/// Source order is preserved and duplicates are dropped, keeping the first
/// occurrence. Never fails.
///
/// # Examples
///
/// ```
/// use imagesync_core::{missing_tags, TagSet};
///
/// let source: TagSet = ["v3", "v2", "v1"].into_iter().collect();
/// let destination: TagSet = ["v2"].into_iter().collect();
///
/// let missing = missing_tags(&source, &destination);
/// assert_eq!(missing.to_string(), "[v3, v1]");
/// ```
#[must_use]
pub fn missing_tags(source: &TagSet, destination: &TagSet) -> TagSet {
    let present: HashSet<&TagName> = destination.iter().collect();
    let mut seen: HashSet<&TagName> = HashSet::with_capacity(source.len());

    source
        .iter()
        .filter(|tag| !present.contains(*tag) && seen.insert(*tag))
        .cloned()
        .collect()
}
