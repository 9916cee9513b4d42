//! TagCatalog - static registry of behavior tags
//!
//! Road-facing tags (`f1`..`f12`) describe what the forward camera saw;
//! driver-facing tags (`d1`..`d5`) describe the cabin camera. Keys are
//! case-insensitive and normalized to lowercase on construction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tagger::error::{TaggerError, TaggerResult};

// =============================================================================
// TagKey
// =============================================================================

const NO_TAG_KEY: &str = "no-tag";
const NO_TAG_NAME: &str = "No Tag";

/// Stable, lowercase tag identifier. Deserializing normalizes like `new`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TagKey(String);

impl TagKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_lowercase())
    }

    /// The exclusive "reviewed, nothing applies" sentinel
    pub fn no_tag() -> Self {
        Self(NO_TAG_KEY.to_string())
    }

    pub fn is_no_tag(&self) -> bool {
        self.0 == NO_TAG_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for TagKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<TagKey> for String {
    fn from(key: TagKey) -> Self {
        key.0
    }
}

// =============================================================================
// Tag
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagGroup {
    RoadFacing,
    DriverFacing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: TagKey,
    pub name: String,
    pub group: TagGroup,
}

const ROAD_FACING: &[(&str, &str)] = &[
    ("f1", "Close Following/Tailgating"),
    ("f2", "Lane Cutoff"),
    ("f3", "Unsafe Lane Change"),
    ("f4", "Stop Sign Violation"),
    ("f5", "Running a Red light"),
    ("f6", "Forward Collision Warning"),
    ("f7", "Near Collision"),
    ("f8", "Unsafe Parking"),
    ("f9", "Alert driving"),
    ("f10", "Safe distancing"),
    ("f11", "Possible collision"),
    ("f12", "Collision"),
];

const DRIVER_FACING: &[(&str, &str)] = &[
    ("d1", "Distraction"),
    ("d2", "Cellphone"),
    ("d3", "Drowsiness"),
    ("d4", "Seat Belt Violation"),
    ("d5", "Smoking"),
];

// =============================================================================
// TagCatalog
// =============================================================================

/// Ordered, immutable set of tags
#[derive(Debug, Clone)]
pub struct TagCatalog {
    tags: Vec<Tag>,
}

impl Default for TagCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl TagCatalog {
    /// Catalog used by the review overlay: F1-F12 road, D1-D5 driver
    pub fn standard() -> Self {
        let road = ROAD_FACING.iter().map(|(k, n)| (*k, *n, TagGroup::RoadFacing));
        let driver = DRIVER_FACING.iter().map(|(k, n)| (*k, *n, TagGroup::DriverFacing));
        let tags = road
            .chain(driver)
            .map(|(key, name, group)| Tag {
                key: TagKey::new(key),
                name: name.to_string(),
                group,
            })
            .collect();
        Self { tags }
    }

    /// Build from explicit tags. Duplicate keys (after case folding) and the
    /// reserved sentinel key are rejected.
    pub fn from_tags(tags: Vec<Tag>) -> TaggerResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for tag in &tags {
            if tag.key.is_no_tag() {
                return Err(TaggerError::Config(format!(
                    "tag key '{}' is reserved",
                    tag.key
                )));
            }
            if tag.key.as_str().is_empty() {
                return Err(TaggerError::Config("empty tag key".to_string()));
            }
            if !seen.insert(tag.key.clone()) {
                return Err(TaggerError::Config(format!(
                    "duplicate tag key '{}'",
                    tag.key
                )));
            }
        }
        Ok(Self { tags })
    }

    pub fn get(&self, key: &TagKey) -> Option<&Tag> {
        self.tags.iter().find(|t| &t.key == key)
    }

    pub fn contains(&self, key: &TagKey) -> bool {
        self.get(key).is_some()
    }

    /// Display name, including the sentinel's
    pub fn display_name(&self, key: &TagKey) -> Option<&str> {
        if key.is_no_tag() {
            return Some(NO_TAG_NAME);
        }
        self.get(key).map(|t| t.name.as_str())
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn group(&self, group: TagGroup) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(move |t| t.group == group)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
