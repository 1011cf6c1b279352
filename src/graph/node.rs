//! Tag node representation
//!
//! One node, two edge semantics: `sub_tags` is the owning tree edge (child
//! order is user-visible), `implied_tags`/`implied_by_tags` form the
//! non-owning implication relation. The backward set is derived and never
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::TagRecord;

/// Well-known id of the sentinel root tag
pub const ROOT_ID: &str = "trellis:root";

/// Sentinel color meaning "inherit from the nearest colored ancestor"
pub const COLOR_INHERIT: &str = "inherit";

/// Unique identifier for a tag
///
/// Serializes as a plain string (UUID for tags created here, arbitrary
/// backend-supplied id for loaded ones)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    /// Create a new random TagId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The fixed id of the sentinel root
    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    /// Create a TagId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Node lifecycle. Transitions only move forward: a detached node never
/// re-attaches and a disposed node stops reacting to mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Attached,
    Detached,
    Disposed,
}

/// A node in the tag graph
#[derive(Debug, Clone)]
pub struct Tag {
    /// Unique identifier
    pub id: TagId,
    /// Display name; not unique across the graph
    pub name: String,
    /// CSS color string, or [`COLOR_INHERIT`]
    pub color: String,
    pub is_hidden: bool,
    /// Immutable creation timestamp
    pub date_added: DateTime<Utc>,
    /// Best-effort cached count of files carrying this tag. A cache, not
    /// ground truth: only monotonic under controlled call sequences.
    pub file_count: u32,
    /// Single parent back-reference. The root points at itself.
    pub parent: TagId,
    /// Ordered owning children (tree edge)
    pub sub_tags: Vec<TagId>,
    /// Forward implication references. Kept in insertion order so records
    /// round-trip stably; membership is what matters.
    pub implied_tags: Vec<TagId>,
    /// Derived backward implication references; rebuilt on load
    pub implied_by_tags: Vec<TagId>,
    pub(crate) state: TagState,
}

impl Tag {
    /// Create a fresh tag under the given parent
    pub fn new(parent: TagId, name: impl Into<String>) -> Self {
        Self {
            id: TagId::new(),
            name: name.into(),
            color: COLOR_INHERIT.to_string(),
            is_hidden: false,
            date_added: Utc::now(),
            file_count: 0,
            parent,
            sub_tags: Vec::new(),
            implied_tags: Vec::new(),
            implied_by_tags: Vec::new(),
            state: TagState::Attached,
        }
    }

    /// The sentinel root node: self-referential parent, fixed id
    pub(crate) fn root_node() -> Self {
        Self {
            id: TagId::root(),
            name: "root".to_string(),
            color: COLOR_INHERIT.to_string(),
            is_hidden: false,
            date_added: Utc::now(),
            file_count: 0,
            parent: TagId::root(),
            sub_tags: Vec::new(),
            implied_tags: Vec::new(),
            implied_by_tags: Vec::new(),
            state: TagState::Attached,
        }
    }

    pub fn state(&self) -> TagState {
        self.state
    }

    pub fn is_disposed(&self) -> bool {
        self.state == TagState::Disposed
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    /// Serialize into the storage contract shape
    pub fn to_record(&self) -> TagRecord {
        TagRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            date_added: self.date_added,
            color: self.color.clone(),
            sub_tags: self.sub_tags.clone(),
            is_hidden: self.is_hidden,
            implied_tags: self.implied_tags.clone(),
        }
    }

    /// Reconstruct from a persisted record.
    ///
    /// `parent` and `implied_by_tags` are not part of the record; both are
    /// resolved during hydration (parent defaults to root until a claiming
    /// parent is found).
    pub fn from_record(record: TagRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            color: record.color,
            is_hidden: record.is_hidden,
            date_added: record.date_added,
            file_count: 0,
            parent: TagId::root(),
            sub_tags: record.sub_tags,
            implied_tags: record.implied_tags,
            implied_by_tags: Vec::new(),
            state: TagState::Attached,
        }
    }
}
