//! Storage layer: trait boundary plus the two reference backends

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{OpenStore, StorageError, StorageResult, TagRecord, TagStore};
