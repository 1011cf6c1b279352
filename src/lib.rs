//! Trellis: tag graph consistency engine
//!
//! An in-memory model of a content library's tag hierarchy, augmented by a
//! second, independent implication relation between tags. One flat node
//! table carries two edge semantics: the owning tree (ordered `sub_tags`
//! plus a parent back-reference) and the non-owning implication edges,
//! whose forward and backward sets stay symmetric at all times.
//!
//! Structurally invalid edits — cycles, self-reference, contradictory
//! nesting — are rejected before they apply. Already-corrupted persisted
//! data is walked fail-soft: traversals carry visited/path guards and a
//! depth ceiling, truncate the offending branch, and surface a warning
//! instead of looping.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use trellis::{GraphConfig, MemoryStore, NullSink, TagGraph};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = TagGraph::load(
//!     GraphConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NullSink),
//! )
//! .await?;
//!
//! let root = graph.root_id().clone();
//! let animals = graph.create(&root, "animals")?;
//! let cats = graph.create(&animals, "cats")?;
//! assert_eq!(graph.path(&cats), vec!["animals", "cats"]);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
mod graph;
pub mod query;
pub mod storage;

pub use bridge::{
    ChannelSink, EventSink, GraphWarning, NullSink, PersistenceBridge, Severity, TagEvent,
    WarningKind,
};
pub use graph::{
    GraphConfig, Tag, TagGraph, TagId, TagState, TrellisError, TrellisResult, COLOR_INHERIT,
    DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_DEPTH, ROOT_ID,
};
pub use storage::{
    MemoryStore, OpenStore, SqliteStore, StorageError, StorageResult, TagRecord, TagStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
