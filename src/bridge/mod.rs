//! Debounced persistence and change notification
//!
//! Every public mutator on the graph ends by handing this bridge a record
//! snapshot (taken only after the mutation fully completed, back-references
//! included). The bridge coalesces per-tag saves over a debounce window and
//! fans out [`TagEvent`]s so dependents — a file-listing view, a tag panel —
//! can recompute what they derive from the graph.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::graph::TagId;
use crate::storage::{TagRecord, TagStore};

/// How loud a diagnostic should be surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// What a traversal ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A node was reached that is already on the active walk path:
    /// the persisted data contains a true cycle
    CorruptGraph,
    /// The configured depth ceiling was hit before the walk finished
    DepthExceeded,
}

/// A user-visible diagnostic raised while walking possibly-corrupt data
#[derive(Debug, Clone, PartialEq)]
pub struct GraphWarning {
    /// The tag whose traversal raised the warning
    pub tag: TagId,
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
}

impl GraphWarning {
    pub fn corrupt(tag: TagId, message: impl Into<String>) -> Self {
        Self {
            tag,
            kind: WarningKind::CorruptGraph,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn depth_exceeded(tag: TagId, message: impl Into<String>) -> Self {
        Self {
            tag,
            kind: WarningKind::DepthExceeded,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.tag, self.message)
    }
}

/// A change notification fired after a mutation committed
#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    /// Tree topology changed; the flattened tag list was recomputed
    TopologyChanged,
    /// Which files are visible under some tag changed; dependents should
    /// refetch rather than recompute visibility locally
    RefetchFiles,
    /// Cycle/depth diagnostic surfaced while traversing
    Warning(GraphWarning),
}

/// Receives events fired by graph mutations and traversal diagnostics
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TagEvent);
}

/// Sink that forwards events into an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TagEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TagEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TagEvent) {
        // Receiver may be gone (e.g. a CLI that only writes); not an error
        let _ = self.tx.send(event);
    }
}

/// Sink that drops everything; for tools with no dependents
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: TagEvent) {}
}

/// Couples the graph to its storage collaborator and its dependents.
///
/// Attribute and edge saves are debounced per tag (last snapshot wins);
/// create/remove/merge are structural and go out immediately, though still
/// asynchronously. No cross-tag ordering is guaranteed.
pub struct PersistenceBridge {
    store: Arc<dyn TagStore>,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
    debounce: Duration,
    pending: Arc<DashMap<TagId, JoinHandle<()>>>,
    immediate: Mutex<Vec<JoinHandle<()>>>,
}

impl PersistenceBridge {
    /// Must be called from within a Tokio runtime; the handle is captured
    /// here so mutators themselves can stay synchronous.
    pub fn new(store: Arc<dyn TagStore>, sink: Arc<dyn EventSink>, debounce: Duration) -> Self {
        Self {
            store,
            sink,
            runtime: Handle::current(),
            debounce,
            pending: Arc::new(DashMap::new()),
            immediate: Mutex::new(Vec::new()),
        }
    }

    pub fn emit(&self, event: TagEvent) {
        self.sink.emit(event);
    }

    /// Enqueue a debounced serialize+save for one tag.
    ///
    /// A snapshot already pending for the same tag is dropped: bursts of
    /// edits collapse into one backend call carrying the latest state.
    pub fn schedule_save(&self, record: TagRecord) {
        let id = record.id.clone();
        if let Some((_, prev)) = self.pending.remove(&id) {
            prev.abort();
        }
        debug!(tag = %id, "scheduling debounced save");

        let store = self.store.clone();
        let pending = self.pending.clone();
        let debounce = self.debounce;
        let key = id.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            pending.remove(&key);
            if let Err(e) = store.save_tag(&record).await {
                warn!(tag = %record.id, error = %e, "debounced save failed");
            }
        });
        self.pending.insert(id, handle);
    }

    /// Drop the pending write for a disposed tag, if any
    pub fn cancel_pending(&self, id: &TagId) {
        if let Some((_, handle)) = self.pending.remove(id) {
            debug!(tag = %id, "cancelling pending save for disposed tag");
            handle.abort();
        }
    }

    pub fn persist_create(&self, record: TagRecord) {
        let store = self.store.clone();
        self.track(self.runtime.spawn(async move {
            if let Err(e) = store.create_tag(&record).await {
                warn!(tag = %record.id, error = %e, "create failed");
            }
        }));
    }

    pub fn persist_remove(&self, ids: Vec<TagId>) {
        let store = self.store.clone();
        self.track(self.runtime.spawn(async move {
            if let Err(e) = store.remove_tags(&ids).await {
                warn!(error = %e, "removal failed");
            }
        }));
    }

    pub fn persist_merge(&self, removed: TagId, target: TagId) {
        let store = self.store.clone();
        self.track(self.runtime.spawn(async move {
            if let Err(e) = store.merge_tags(&removed, &target).await {
                warn!(removed = %removed, target = %target, error = %e, "merge failed");
            }
        }));
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut immediate = self.immediate.lock().unwrap();
        immediate.retain(|h| !h.is_finished());
        immediate.push(handle);
    }

    /// Wait for every in-flight write. Immediate structural writes are
    /// joined first — their snapshots predate anything sitting in the
    /// debounce window — then pending debounced saves run to completion
    /// (still honoring their full window). Used at shutdown and in tests.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut immediate = self.immediate.lock().unwrap();
            immediate.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        let keys: Vec<TagId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, handle)) = self.pending.remove(&key) {
                let _ = handle.await;
            }
        }
    }
}
