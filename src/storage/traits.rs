//! Storage trait definitions
//!
//! The graph core never talks to a database directly. It serializes tags
//! into [`TagRecord`]s and hands them to a [`TagStore`]; the record shape
//! is the sole contract boundary between the core and its backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::graph::TagId;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Wire/storage form of a single tag.
///
/// `sub_tags` carries the owning tree edge (child order matters);
/// `implied_tags` carries the forward implication edges. The backward
/// implication set is derived on load and never persisted. There is no
/// file-count field: that counter is a runtime cache owned by whoever
/// lists files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
    pub date_added: DateTime<Utc>,
    pub color: String,
    pub sub_tags: Vec<TagId>,
    pub is_hidden: bool,
    pub implied_tags: Vec<TagId>,
}

/// Trait for tag storage backends
///
/// Implementations must be thread-safe (Send + Sync): the persistence
/// bridge calls them from spawned tasks after debounce timers fire.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Load every persisted tag record
    async fn fetch_tags(&self) -> StorageResult<Vec<TagRecord>>;

    /// Persist a newly created tag
    async fn create_tag(&self, record: &TagRecord) -> StorageResult<()>;

    /// Save a tag (insert or update)
    async fn save_tag(&self, record: &TagRecord) -> StorageResult<()>;

    /// Remove the given tags
    async fn remove_tags(&self, ids: &[TagId]) -> StorageResult<()>;

    /// Remove `removed_id` and reassign its file associations to `target_id`
    async fn merge_tags(&self, removed_id: &TagId, target_id: &TagId) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: TagStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
