//! Shared fixtures for graph and query tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;

use super::engine::{GraphConfig, TagGraph};
use super::node::{TagId, COLOR_INHERIT};
use crate::bridge::{ChannelSink, NullSink, PersistenceBridge, TagEvent};
use crate::storage::{MemoryStore, TagRecord};

pub(crate) fn record(id: &TagId, name: &str) -> TagRecord {
    TagRecord {
        id: id.clone(),
        name: name.to_string(),
        date_added: Utc::now(),
        color: COLOR_INHERIT.to_string(),
        sub_tags: Vec::new(),
        is_hidden: false,
        implied_tags: Vec::new(),
    }
}

pub(crate) async fn memory_graph() -> (TagGraph, Arc<MemoryStore>) {
    let config = GraphConfig {
        debounce_ms: 5,
        ..GraphConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let bridge = PersistenceBridge::new(
        store.clone(),
        Arc::new(NullSink),
        Duration::from_millis(config.debounce_ms),
    );
    (TagGraph::new(config, bridge), store)
}

/// Graph whose events land in the returned channel
pub(crate) async fn channel_graph() -> (
    TagGraph,
    Arc<MemoryStore>,
    UnboundedReceiver<TagEvent>,
) {
    let config = GraphConfig {
        debounce_ms: 5,
        ..GraphConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let (sink, rx) = ChannelSink::new();
    let bridge = PersistenceBridge::new(
        store.clone(),
        Arc::new(sink),
        Duration::from_millis(config.debounce_ms),
    );
    (TagGraph::new(config, bridge), store, rx)
}

pub(crate) fn drain_events(rx: &mut UnboundedReceiver<TagEvent>) -> Vec<TagEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Chain a -> b -> c -> d under root
pub(crate) async fn sample_graph() -> (TagGraph, HashMap<&'static str, TagId>) {
    let (mut graph, _store) = memory_graph().await;
    let root = graph.root_id().clone();
    let a = graph.create(&root, "a").unwrap();
    let b = graph.create(&a, "b").unwrap();
    let c = graph.create(&b, "c").unwrap();
    let d = graph.create(&c, "d").unwrap();
    (
        graph,
        HashMap::from([("a", a), ("b", b), ("c", c), ("d", d)]),
    )
}

/// Two records that claim each other as children: a true persisted cycle,
/// preserved by hydration as an island off the root
pub(crate) async fn corrupt_pair() -> (TagGraph, TagId, TagId) {
    let a = TagId::from_string("tag:a");
    let b = TagId::from_string("tag:b");
    let mut rec_a = record(&a, "a");
    rec_a.sub_tags = vec![b.clone()];
    let mut rec_b = record(&b, "b");
    rec_b.sub_tags = vec![a.clone()];

    let store = Arc::new(MemoryStore::new());
    let bridge = PersistenceBridge::new(store, Arc::new(NullSink), Duration::from_millis(5));
    let graph = TagGraph::hydrate(GraphConfig::default(), bridge, vec![rec_a, rec_b]);
    (graph, a, b)
}

/// A parent chain of `len` records under a ceiling of `max_depth`;
/// returns the graph and the deepest tag
pub(crate) async fn deep_chain(max_depth: usize, len: usize) -> (TagGraph, TagId) {
    let ids: Vec<TagId> = (0..len)
        .map(|i| TagId::from_string(format!("tag:{i}")))
        .collect();
    let mut records = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let mut rec = record(id, &format!("t{i}"));
        if i + 1 < len {
            rec.sub_tags = vec![ids[i + 1].clone()];
        }
        records.push(rec);
    }

    let store = Arc::new(MemoryStore::new());
    let bridge = PersistenceBridge::new(store, Arc::new(NullSink), Duration::from_millis(5));
    let config = GraphConfig {
        max_depth,
        ..GraphConfig::default()
    };
    let graph = TagGraph::hydrate(config, bridge, records);
    (graph, ids[len - 1].clone())
}
