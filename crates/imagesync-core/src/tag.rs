//! Tag names and ordered tag sets.
//!
//! A [`TagName`] is opaque apart from equality and the reserved
//! [`LATEST_TAG`] sentinel. A [`TagSet`] keeps tags in the order the
//! registry reported them, most recent first where the provider orders
//! its listing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The floating tag that the exclusion policy filters out.
pub const LATEST_TAG: &str = "latest";

/// A single tag within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagName(String);

impl TagName {
    /// Creates a tag name.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagesync_core::TagName;
    ///
    /// let tag = TagName::new("v1.2.0");
    /// assert_eq!(tag.as_str(), "v1.2.0");
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the `latest` sentinel.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.0 == LATEST_TAG
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TagName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered sequence of tags.
///
/// Order is insertion order. Capping and filtering are applied by whoever
/// builds the set; the set itself holds whatever it is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: Vec<TagName>,
}

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Appends a tag at the end of the set.
    pub fn push(&mut self, tag: TagName) {
        self.tags.push(tag);
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true if the set has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Returns true if the set holds a tag equal to `tag`.
    #[must_use]
    pub fn contains(&self, tag: &TagName) -> bool {
        self.tags.contains(tag)
    }

    /// Iterates over tags in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TagName> {
        self.tags.iter()
    }

    /// Returns the tags as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[TagName] {
        &self.tags
    }

    /// Consumes the set, returning the tags.
    #[must_use]
    pub fn into_vec(self) -> Vec<TagName> {
        self.tags
    }
}

impl FromIterator<TagName> for TagSet {
    fn from_iter<I: IntoIterator<Item = TagName>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(TagName::from).collect()
    }
}

impl IntoIterator for TagSet {
    type Item = TagName;
    type IntoIter = std::vec::IntoIter<TagName>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a TagName;
    type IntoIter = std::slice::Iter<'a, TagName>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(tag.as_str())?;
        }
        f.write_str("]")
    }
}
