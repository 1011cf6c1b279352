//! In-memory tag store
//!
//! Backs tests and scratch sessions. Counts every call so tests can
//! assert on persistence traffic (e.g. that a no-op reconciliation
//! performed zero saves).

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::traits::{StorageResult, TagRecord, TagStore};
use crate::graph::TagId;

/// Tag store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<TagId, TagRecord>,
    creates: AtomicUsize,
    saves: AtomicUsize,
    removes: AtomicUsize,
    merges: Mutex<Vec<(TagId, TagId)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records
    pub fn with_records(records: Vec<TagRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.id.clone(), record);
        }
        store
    }

    pub fn record(&self, id: &TagId) -> Option<TagRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    /// (removed, target) pairs passed to `merge_tags`, in call order
    pub fn merge_calls(&self) -> Vec<(TagId, TagId)> {
        self.merges.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn fetch_tags(&self) -> StorageResult<Vec<TagRecord>> {
        Ok(self.records.iter().map(|r| r.clone()).collect())
    }

    async fn create_tag(&self, record: &TagRecord) -> StorageResult<()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn save_tag(&self, record: &TagRecord) -> StorageResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn remove_tags(&self, ids: &[TagId]) -> StorageResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        for id in ids {
            self.records.remove(id);
        }
        Ok(())
    }

    async fn merge_tags(&self, removed_id: &TagId, target_id: &TagId) -> StorageResult<()> {
        self.merges
            .lock()
            .unwrap()
            .push((removed_id.clone(), target_id.clone()));
        self.records.remove(removed_id);
        Ok(())
    }
}
