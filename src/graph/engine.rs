//! TagGraph: the node table, the root, and the safe mutation surface
//!
//! All mutation is synchronous and single-writer. Each public mutator
//! validates, applies the whole change (back-references included), and only
//! then hands record snapshots to the persistence bridge and fires events —
//! no side effect ever reads a half-mutated graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::node::{Tag, TagId, TagState};
use super::validate;
use crate::bridge::{EventSink, GraphWarning, PersistenceBridge, TagEvent};
use crate::query;
use crate::storage::{TagRecord, TagStore};

/// Default traversal depth ceiling. Deep enough for any hierarchy a person
/// builds on purpose; shallow enough to cut off cyclic backup data fast.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default per-tag write coalescing window
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Tuning knobs, passed explicitly to whoever builds a graph
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Traversal depth ceiling ("MAX_TAG_DEPTH")
    pub max_depth: usize,
    /// Debounce window for per-tag saves, in milliseconds
    pub debounce_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// Errors that can occur in graph operations
///
/// Structural violations from interactive editing are *not* errors — those
/// mutators return `false` and leave the graph untouched.
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("Tag not found: {0}")]
    TagNotFound(TagId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for graph operations
pub type TrellisResult<T> = Result<T, TrellisError>;

/// The tag graph: one flat id-keyed node table carrying both edge
/// relations, walked only through guarded traversal
pub struct TagGraph {
    config: GraphConfig,
    nodes: HashMap<TagId, Tag>,
    root: TagId,
    /// Flattened depth-first id list, rebuilt whenever topology changes
    tag_list: Vec<TagId>,
    /// Ids currently selected in the UI; pruned on delete
    selection: HashSet<TagId>,
    bridge: PersistenceBridge,
}

impl TagGraph {
    /// Create an empty graph containing only the root
    pub fn new(config: GraphConfig, bridge: PersistenceBridge) -> Self {
        let root = TagId::root();
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), Tag::root_node());
        Self {
            config,
            nodes,
            root,
            tag_list: Vec::new(),
            selection: HashSet::new(),
            bridge,
        }
    }

    /// Fetch all records from the store and build a graph from them
    pub async fn load(
        config: GraphConfig,
        store: Arc<dyn TagStore>,
        sink: Arc<dyn EventSink>,
    ) -> TrellisResult<Self> {
        let records = store.fetch_tags().await?;
        let debounce = Duration::from_millis(config.debounce_ms);
        let bridge = PersistenceBridge::new(store, sink, debounce);
        Ok(Self::hydrate(config, bridge, records))
    }

    /// Build a graph from persisted records, tolerating corrupt data.
    ///
    /// Dangling, duplicate and self-referential edge entries are dropped;
    /// nodes no record claims as a child are re-attached under root. True
    /// cycles between claimed nodes are preserved as-is — the traversal
    /// guards keep them from ever looping a walk.
    pub fn hydrate(config: GraphConfig, bridge: PersistenceBridge, records: Vec<TagRecord>) -> Self {
        let root = TagId::root();
        let mut nodes: HashMap<TagId, Tag> = HashMap::new();
        let mut order: Vec<TagId> = Vec::new();

        for record in records {
            if nodes.contains_key(&record.id) {
                warn!(tag = %record.id, "duplicate tag record; keeping the first");
                continue;
            }
            order.push(record.id.clone());
            nodes.insert(record.id.clone(), Tag::from_record(record));
        }
        if !nodes.contains_key(&root) {
            nodes.insert(root.clone(), Tag::root_node());
            order.insert(0, root.clone());
        }

        // Resolve tree edges: first claim on a child wins
        let mut claimed: HashSet<TagId> = HashSet::new();
        for id in &order {
            let children = nodes[id].sub_tags.clone();
            let mut kept: Vec<TagId> = Vec::new();
            for child in children {
                if child == *id
                    || child.is_root()
                    || !nodes.contains_key(&child)
                    || claimed.contains(&child)
                {
                    warn!(parent = %id, child = %child, "dropping invalid child reference");
                    continue;
                }
                claimed.insert(child.clone());
                kept.push(child);
            }
            for child in &kept {
                nodes.get_mut(child).unwrap().parent = id.clone();
            }
            nodes.get_mut(id).unwrap().sub_tags = kept;
        }

        // Orphans go back under root so the table stays a forest
        for id in &order {
            if id.is_root() || claimed.contains(id) {
                continue;
            }
            debug!(tag = %id, "re-attaching orphan tag under root");
            nodes.get_mut(id).unwrap().parent = root.clone();
            nodes.get_mut(&root).unwrap().sub_tags.push(id.clone());
        }

        // Resolve implication edges and derive the backward sets
        for id in &order {
            let implied = nodes[id].implied_tags.clone();
            let mut kept: Vec<TagId> = Vec::new();
            for target in implied {
                if target == *id
                    || target.is_root()
                    || !nodes.contains_key(&target)
                    || kept.contains(&target)
                {
                    warn!(tag = %id, target = %target, "dropping invalid implication reference");
                    continue;
                }
                kept.push(target);
            }
            for target in &kept {
                nodes.get_mut(target).unwrap().implied_by_tags.push(id.clone());
            }
            nodes.get_mut(id).unwrap().implied_tags = kept;
        }

        let mut graph = Self {
            config,
            nodes,
            root,
            tag_list: Vec::new(),
            selection: HashSet::new(),
            bridge,
        };
        graph.rebuild_tag_list();
        graph
    }

    // --- Accessors ---

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn root_id(&self) -> &TagId {
        &self.root
    }

    pub fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.nodes.get(id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.nodes.values()
    }

    /// Number of tags, root excluded
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattened depth-first tag ids, root excluded
    pub fn tag_list(&self) -> &[TagId] {
        &self.tag_list
    }

    pub fn bridge(&self) -> &PersistenceBridge {
        &self.bridge
    }

    // --- Mutators ---

    /// Create a tag as the last child of `parent`.
    ///
    /// Names are not unique; the only failure is a missing (already
    /// deleted) parent.
    pub fn create(&mut self, parent: &TagId, name: impl Into<String>) -> TrellisResult<TagId> {
        if self.tag(parent).is_none() {
            return Err(TrellisError::TagNotFound(parent.clone()));
        }
        let tag = Tag::new(parent.clone(), name);
        let id = tag.id.clone();
        self.nodes.insert(id.clone(), tag);
        self.nodes.get_mut(parent).unwrap().sub_tags.push(id.clone());
        self.rebuild_tag_list();

        self.bridge.persist_create(self.nodes[&id].to_record());
        self.bridge.schedule_save(self.nodes[parent].to_record());
        self.bridge.emit(TagEvent::TopologyChanged);
        Ok(id)
    }

    /// Reorder `tag` within its current parent, or reparent it under
    /// `new_parent`, splicing it in at `at_index` (clamped).
    ///
    /// Returns false — with zero mutation — when the move is structurally
    /// invalid: self-reference, moving the root, nesting beneath a tag's
    /// own descendant, or nesting across an implication in either
    /// direction.
    pub fn insert_sub_tag(&mut self, new_parent: &TagId, tag: &TagId, at_index: usize) -> bool {
        if new_parent == tag || tag.is_root() {
            return false;
        }
        if self.tag(new_parent).is_none() || self.tag(tag).is_none() {
            return false;
        }

        let old_parent = self.nodes[tag].parent.clone();
        if &old_parent == new_parent {
            return self.reorder_sub_tag(new_parent, tag, at_index);
        }

        if validate::is_ancestor(self, new_parent, tag)
            || validate::is_implied_ancestor(self, tag, new_parent)
            || validate::is_implied_ancestor(self, new_parent, tag)
        {
            return false;
        }

        self.nodes
            .get_mut(&old_parent)
            .unwrap()
            .sub_tags
            .retain(|child| child != tag);
        {
            let new = self.nodes.get_mut(new_parent).unwrap();
            let index = at_index.min(new.sub_tags.len());
            new.sub_tags.insert(index, tag.clone());
        }
        self.nodes.get_mut(tag).unwrap().parent = new_parent.clone();
        self.rebuild_tag_list();

        self.bridge.schedule_save(self.nodes[&old_parent].to_record());
        self.bridge.schedule_save(self.nodes[new_parent].to_record());
        self.bridge.emit(TagEvent::TopologyChanged);
        self.bridge.emit(TagEvent::RefetchFiles);
        true
    }

    fn reorder_sub_tag(&mut self, parent: &TagId, tag: &TagId, at_index: usize) -> bool {
        let children = &mut self.nodes.get_mut(parent).unwrap().sub_tags;
        let Some(old_index) = children.iter().position(|child| child == tag) else {
            return false;
        };
        children.remove(old_index);
        // The removal shifted everything after the old slot left by one
        let mut index = if at_index > old_index {
            at_index - 1
        } else {
            at_index
        };
        index = index.min(children.len());
        children.insert(index, tag.clone());
        if index == old_index {
            return true;
        }
        self.rebuild_tag_list();
        self.bridge.schedule_save(self.nodes[parent].to_record());
        self.bridge.emit(TagEvent::TopologyChanged);
        true
    }

    /// Record that having `tag` implies `implied`.
    ///
    /// The forward and backward sets are updated together; symmetry holds
    /// before any side effect runs. Returns false when the edge is a
    /// self-reference, touches root, already holds (directly or through
    /// the closure), or would close a cycle.
    pub fn add_implied_tag(&mut self, tag: &TagId, implied: &TagId) -> bool {
        if tag == implied || tag.is_root() || implied.is_root() {
            return false;
        }
        if self.tag(tag).is_none() || self.tag(implied).is_none() {
            return false;
        }
        if self.nodes[tag].implied_tags.contains(implied) {
            return false;
        }
        if validate::is_ancestor(self, tag, implied)
            || validate::is_ancestor(self, implied, tag)
            || validate::is_implied_ancestor(self, tag, implied)
            || validate::is_implied_ancestor(self, implied, tag)
        {
            return false;
        }

        self.nodes.get_mut(tag).unwrap().implied_tags.push(implied.clone());
        self.nodes
            .get_mut(implied)
            .unwrap()
            .implied_by_tags
            .push(tag.clone());

        self.bridge.schedule_save(self.nodes[tag].to_record());
        self.bridge.emit(TagEvent::RefetchFiles);
        true
    }

    /// Remove the implication edge from `tag` to `implied`, both sides at
    /// once. Returns false if no such edge exists.
    pub fn remove_implied_tag(&mut self, tag: &TagId, implied: &TagId) -> bool {
        if self.tag(tag).is_none() || self.tag(implied).is_none() {
            return false;
        }
        if !self.nodes[tag].implied_tags.contains(implied) {
            return false;
        }

        self.nodes
            .get_mut(tag)
            .unwrap()
            .implied_tags
            .retain(|t| t != implied);
        self.nodes
            .get_mut(implied)
            .unwrap()
            .implied_by_tags
            .retain(|t| t != tag);

        self.bridge.schedule_save(self.nodes[tag].to_record());
        self.bridge.emit(TagEvent::RefetchFiles);
        true
    }

    /// Reconcile `tag`'s forward implications against `new_set` by diff:
    /// stale edges are removed, missing ones added (each addition passes
    /// the usual gates). A no-op diff performs zero edge mutations and
    /// zero persistence calls. Returns the number of edges changed.
    pub fn replace_implied_tags(&mut self, tag: &TagId, new_set: &[TagId]) -> usize {
        if self.tag(tag).is_none() {
            return 0;
        }
        let current = self.nodes[tag].implied_tags.clone();
        let mut changed = 0;
        for old in &current {
            if !new_set.contains(old) && self.remove_implied_tag(tag, old) {
                changed += 1;
            }
        }
        for new in new_set {
            if !current.contains(new) && self.add_implied_tag(tag, new) {
                changed += 1;
            }
        }
        changed
    }

    /// Like [`replace_implied_tags`](Self::replace_implied_tags), but for
    /// the backward set: the mutated edges live on the *other* tags.
    pub fn replace_implied_by_tags(&mut self, tag: &TagId, new_set: &[TagId]) -> usize {
        if self.tag(tag).is_none() {
            return 0;
        }
        let current = self.nodes[tag].implied_by_tags.clone();
        let mut changed = 0;
        for old in &current {
            if !new_set.contains(old) && self.remove_implied_tag(old, tag) {
                changed += 1;
            }
        }
        for new in new_set {
            if !current.contains(new) && self.add_implied_tag(new, tag) {
                changed += 1;
            }
        }
        changed
    }

    /// Delete a tag and its whole subtree
    pub fn delete(&mut self, tag: &TagId) -> TrellisResult<()> {
        self.delete_tags(std::slice::from_ref(tag))
    }

    /// Delete several tags (and their subtrees) in one pass: one removal
    /// call to the backend, one set of events.
    pub fn delete_tags(&mut self, tags: &[TagId]) -> TrellisResult<()> {
        for id in tags {
            if id.is_root() {
                return Err(TrellisError::InvalidOperation(
                    "the root tag cannot be deleted".to_string(),
                ));
            }
            if self.tag(id).is_none() {
                return Err(TrellisError::TagNotFound(id.clone()));
            }
        }

        // Collect every id going away before touching anything
        let mut warnings = Vec::new();
        let mut removed: Vec<TagId> = Vec::new();
        let mut removed_set: HashSet<TagId> = HashSet::new();
        for id in tags {
            if removed_set.contains(id) {
                continue;
            }
            for sub in query::sub_tree(self, id, &mut warnings) {
                if removed_set.insert(sub.clone()) {
                    removed.push(sub);
                }
            }
        }

        // Detach each deletion root from its surviving parent, once
        let mut saves: HashSet<TagId> = HashSet::new();
        for id in tags {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let parent = node.parent.clone();
            if removed_set.contains(&parent) {
                continue;
            }
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.sub_tags.retain(|child| child != id);
                saves.insert(parent);
            }
            self.nodes.get_mut(id).unwrap().state = TagState::Detached;
        }

        // Sever implication edges between survivors and the removed set
        let survivors: Vec<TagId> = self
            .nodes
            .keys()
            .filter(|id| !removed_set.contains(*id))
            .cloned()
            .collect();
        for id in &survivors {
            let node = self.nodes.get_mut(id).unwrap();
            let forward_before = node.implied_tags.len();
            node.implied_tags.retain(|t| !removed_set.contains(t));
            if node.implied_tags.len() != forward_before {
                saves.insert(id.clone());
            }
            node.implied_by_tags.retain(|t| !removed_set.contains(t));
        }

        // Dispose: drop from the table and the selection, cancel writes
        for id in &removed {
            if let Some(node) = self.nodes.get_mut(id) {
                node.state = TagState::Disposed;
            }
            self.nodes.remove(id);
            self.selection.remove(id);
            self.bridge.cancel_pending(id);
        }

        self.rebuild_tag_list();
        self.forward_warnings(warnings);
        for id in saves {
            self.bridge.schedule_save(self.nodes[&id].to_record());
        }
        self.bridge.persist_remove(removed);
        self.bridge.emit(TagEvent::TopologyChanged);
        self.bridge.emit(TagEvent::RefetchFiles);
        Ok(())
    }

    /// Fold `source` into `target`: `source` disappears and the backend
    /// reassigns its file associations to `target`.
    ///
    /// Only valid for a leaf `source`; merging a tag that still has
    /// sub-tags is a [`TrellisError::InvalidOperation`] and changes
    /// nothing.
    pub fn merge(&mut self, source: &TagId, target: &TagId) -> TrellisResult<()> {
        if source.is_root() || target.is_root() {
            return Err(TrellisError::InvalidOperation(
                "the root tag cannot take part in a merge".to_string(),
            ));
        }
        if source == target {
            return Err(TrellisError::InvalidOperation(
                "cannot merge a tag into itself".to_string(),
            ));
        }
        if self.tag(target).is_none() {
            return Err(TrellisError::TagNotFound(target.clone()));
        }
        let Some(node) = self.tag(source) else {
            return Err(TrellisError::TagNotFound(source.clone()));
        };
        if !node.sub_tags.is_empty() {
            return Err(TrellisError::InvalidOperation(format!(
                "cannot merge '{}': it still has sub-tags",
                node.name
            )));
        }

        let parent = node.parent.clone();
        self.nodes
            .get_mut(&parent)
            .unwrap()
            .sub_tags
            .retain(|child| child != source);
        self.nodes.get_mut(source).unwrap().state = TagState::Detached;

        let mut saves: HashSet<TagId> = HashSet::new();
        saves.insert(parent);
        let implied = self.nodes[source].implied_tags.clone();
        for t in implied {
            if let Some(other) = self.nodes.get_mut(&t) {
                other.implied_by_tags.retain(|x| x != source);
            }
        }
        let implied_by = self.nodes[source].implied_by_tags.clone();
        for t in implied_by {
            if let Some(other) = self.nodes.get_mut(&t) {
                other.implied_tags.retain(|x| x != source);
                saves.insert(t);
            }
        }

        self.nodes.get_mut(source).unwrap().state = TagState::Disposed;
        self.nodes.remove(source);
        self.selection.remove(source);
        self.bridge.cancel_pending(source);
        self.rebuild_tag_list();

        for id in saves {
            self.bridge.schedule_save(self.nodes[&id].to_record());
        }
        self.bridge.persist_merge(source.clone(), target.clone());
        self.bridge.emit(TagEvent::TopologyChanged);
        self.bridge.emit(TagEvent::RefetchFiles);
        Ok(())
    }

    pub fn rename(&mut self, tag: &TagId, name: impl Into<String>) -> TrellisResult<()> {
        let node = self
            .nodes
            .get_mut(tag)
            .ok_or_else(|| TrellisError::TagNotFound(tag.clone()))?;
        node.name = name.into();
        let record = node.to_record();
        self.bridge.schedule_save(record);
        Ok(())
    }

    pub fn set_color(&mut self, tag: &TagId, color: impl Into<String>) -> TrellisResult<()> {
        let node = self
            .nodes
            .get_mut(tag)
            .ok_or_else(|| TrellisError::TagNotFound(tag.clone()))?;
        node.color = color.into();
        let record = node.to_record();
        self.bridge.schedule_save(record);
        Ok(())
    }

    /// Hiding a tag changes which files are visible beneath it, so this
    /// one attribute edit also tells dependents to refetch
    pub fn set_hidden(&mut self, tag: &TagId, hidden: bool) -> TrellisResult<()> {
        let node = self
            .nodes
            .get_mut(tag)
            .ok_or_else(|| TrellisError::TagNotFound(tag.clone()))?;
        if node.is_hidden == hidden {
            return Ok(());
        }
        node.is_hidden = hidden;
        let record = node.to_record();
        self.bridge.schedule_save(record);
        self.bridge.emit(TagEvent::RefetchFiles);
        Ok(())
    }

    /// Best-effort cache bump; no persistence, no events
    pub fn increment_file_count(&mut self, tag: &TagId) {
        if let Some(node) = self.nodes.get_mut(tag) {
            node.file_count = node.file_count.saturating_add(1);
        }
    }

    pub fn decrement_file_count(&mut self, tag: &TagId) {
        if let Some(node) = self.nodes.get_mut(tag) {
            node.file_count = node.file_count.saturating_sub(1);
        }
    }

    // --- Selection ---

    pub fn select(&mut self, tag: &TagId) -> bool {
        if self.tag(tag).is_none() || tag.is_root() {
            return false;
        }
        self.selection.insert(tag.clone())
    }

    pub fn deselect(&mut self, tag: &TagId) -> bool {
        self.selection.remove(tag)
    }

    pub fn selection(&self) -> &HashSet<TagId> {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- Queries ---
    //
    // Thin wrappers over `query::*` that forward any cycle/depth
    // diagnostics to dependents as events.

    pub fn get_sub_tree(&self, tag: &TagId) -> Vec<TagId> {
        let mut warnings = Vec::new();
        let result = query::sub_tree(self, tag, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    pub fn get_ancestors(&self, tag: &TagId) -> Vec<TagId> {
        let mut warnings = Vec::new();
        let result = query::ancestors(self, tag, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    pub fn get_implied_sub_tree(&self, tag: &TagId) -> Vec<TagId> {
        let mut warnings = Vec::new();
        let result = query::implied_sub_tree(self, tag, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    pub fn get_implied_ancestors(&self, tag: &TagId) -> Vec<TagId> {
        let mut visited = HashSet::new();
        self.get_implied_ancestors_with(tag, &mut visited)
    }

    /// Batch form: share `visited` across calls to resolve the closure for
    /// many tags without re-walking common ground
    pub fn get_implied_ancestors_with(
        &self,
        tag: &TagId,
        visited: &mut HashSet<TagId>,
    ) -> Vec<TagId> {
        let mut warnings = Vec::new();
        let result = query::implied_ancestors(self, tag, visited, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    pub fn path(&self, tag: &TagId) -> Vec<String> {
        let mut warnings = Vec::new();
        let result = query::path(self, tag, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    pub fn view_color(&self, tag: &TagId) -> String {
        let mut warnings = Vec::new();
        let result = query::view_color(self, tag, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    pub fn path_char_length(&self, tag: &TagId) -> usize {
        let mut warnings = Vec::new();
        let result = query::path_char_length(self, tag, &mut warnings);
        self.forward_warnings(warnings);
        result
    }

    /// True iff `candidate` occurs strictly in `tag`'s parent chain
    pub fn is_ancestor(&self, tag: &TagId, candidate: &TagId) -> bool {
        validate::is_ancestor(self, tag, candidate)
    }

    /// True iff `candidate` occurs strictly in `tag`'s implied-ancestor
    /// closure (at least one implication edge on the path)
    pub fn is_implied_ancestor(&self, tag: &TagId, candidate: &TagId) -> bool {
        validate::is_implied_ancestor(self, tag, candidate)
    }

    // --- Internals ---

    fn rebuild_tag_list(&mut self) {
        let mut warnings = Vec::new();
        let root = self.root.clone();
        let mut list = query::sub_tree(self, &root, &mut warnings);
        list.retain(|id| !id.is_root());
        self.tag_list = list;
        self.forward_warnings(warnings);
    }

    fn forward_warnings(&self, warnings: Vec<GraphWarning>) {
        for warning in warnings {
            warn!(tag = %warning.tag, "{}", warning.message);
            self.bridge.emit(TagEvent::Warning(warning));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::TagEvent;
    use crate::graph::test_support::{channel_graph, drain_events, memory_graph, sample_graph};

    /// All records sorted by id, for before/after comparisons
    fn snapshot(graph: &TagGraph) -> Vec<TagRecord> {
        let mut records: Vec<TagRecord> = graph.tags().map(|t| t.to_record()).collect();
        records.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        records
    }

    #[tokio::test]
    async fn create_appends_as_last_child() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&root, "b").unwrap();

        assert_eq!(
            graph.tag(&root).unwrap().sub_tags,
            vec![a.clone(), b.clone()]
        );
        assert_eq!(graph.tag(&b).unwrap().parent, root);
        assert_eq!(graph.tag_list(), &[a, b]);
    }

    #[tokio::test]
    async fn create_under_deleted_parent_fails() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        graph.delete(&a).unwrap();

        assert!(matches!(
            graph.create(&a, "b"),
            Err(TrellisError::TagNotFound(_))
        ));
    }

    #[tokio::test]
    async fn names_need_not_be_unique() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let first = graph.create(&root, "same").unwrap();
        let second = graph.create(&root, "same").unwrap();
        assert_ne!(first, second);
        assert_eq!(graph.len(), 2);
    }

    #[tokio::test]
    async fn reparent_moves_between_parents() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&root, "b").unwrap();

        assert!(graph.insert_sub_tag(&a, &b, 0));
        assert_eq!(graph.tag(&b).unwrap().parent, a);
        assert_eq!(graph.tag(&root).unwrap().sub_tags, vec![a.clone()]);
        assert_eq!(graph.tag(&a).unwrap().sub_tags, vec![b]);
    }

    #[tokio::test]
    async fn reorder_within_parent_adjusts_for_removal() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&root, "b").unwrap();
        let c = graph.create(&root, "c").unwrap();

        // move c to the front
        assert!(graph.insert_sub_tag(&root, &c, 0));
        assert_eq!(
            graph.tag(&root).unwrap().sub_tags,
            vec![c.clone(), a.clone(), b.clone()]
        );

        // move c "past the end"; index is clamped
        assert!(graph.insert_sub_tag(&root, &c, 10));
        assert_eq!(
            graph.tag(&root).unwrap().sub_tags,
            vec![a.clone(), b.clone(), c.clone()]
        );

        // moving a tag onto its own slot is a successful no-op
        let before = snapshot(&graph);
        assert!(graph.insert_sub_tag(&root, &a, 0));
        assert_eq!(snapshot(&graph), before);
    }

    #[tokio::test]
    async fn insert_rejects_self_root_and_descendant() {
        let (mut graph, ids) = sample_graph().await;
        let root = graph.root_id().clone();
        let before = snapshot(&graph);

        assert!(!graph.insert_sub_tag(&ids["a"], &ids["a"], 0));
        assert!(!graph.insert_sub_tag(&ids["a"], &root, 0));
        // c is a descendant of a: nesting a under c closes a tree cycle
        assert!(!graph.insert_sub_tag(&ids["c"], &ids["a"], 0));
        assert_eq!(snapshot(&graph), before);
    }

    #[tokio::test]
    async fn insert_rejects_nesting_across_an_implication() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&root, "b").unwrap();
        assert!(graph.add_implied_tag(&a, &b));
        let before = snapshot(&graph);

        // a implies b: a must not nest beneath b, nor b beneath a
        assert!(!graph.insert_sub_tag(&b, &a, 0));
        assert!(!graph.insert_sub_tag(&a, &b, 0));
        assert_eq!(snapshot(&graph), before);
    }

    #[tokio::test]
    async fn moving_toward_an_ancestor_is_legal() {
        let (mut graph, ids) = sample_graph().await;
        // c sits under b under a; pulling c up directly under a is fine
        assert!(graph.insert_sub_tag(&ids["a"], &ids["c"], 0));
        assert_eq!(graph.tag(&ids["c"]).unwrap().parent, ids["a"]);
        assert_eq!(
            graph.tag(&ids["a"]).unwrap().sub_tags,
            vec![ids["c"].clone(), ids["b"].clone()]
        );
    }

    #[tokio::test]
    async fn implication_edges_stay_symmetric() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&root, "b").unwrap();

        assert!(graph.add_implied_tag(&a, &b));
        assert_eq!(graph.tag(&a).unwrap().implied_tags, vec![b.clone()]);
        assert_eq!(graph.tag(&b).unwrap().implied_by_tags, vec![a.clone()]);

        assert!(graph.remove_implied_tag(&a, &b));
        assert!(graph.tag(&a).unwrap().implied_tags.is_empty());
        assert!(graph.tag(&b).unwrap().implied_by_tags.is_empty());
        assert!(!graph.remove_implied_tag(&a, &b));
    }

    #[tokio::test]
    async fn implication_rejects_relatives_and_cycles() {
        let (mut graph, ids) = sample_graph().await;
        let root = graph.root_id().clone();
        let x = graph.create(&root, "x").unwrap();
        let y = graph.create(&root, "y").unwrap();

        // self, root, tree relatives
        assert!(!graph.add_implied_tag(&x, &x));
        assert!(!graph.add_implied_tag(&x, &root));
        assert!(!graph.add_implied_tag(&ids["c"], &ids["a"])); // ancestor
        assert!(!graph.add_implied_tag(&ids["a"], &ids["c"])); // descendant

        // x -> y, then y -> x would close a cycle
        assert!(graph.add_implied_tag(&x, &y));
        assert!(!graph.add_implied_tag(&y, &x));
        assert!(!graph.add_implied_tag(&x, &y)); // duplicate

        // transitive: y -> c, then c -> x would close x -> y -> c -> x
        assert!(graph.add_implied_tag(&y, &ids["c"]));
        assert!(!graph.add_implied_tag(&ids["c"], &x));
    }

    #[tokio::test]
    async fn replace_implied_tags_applies_the_diff() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let t = graph.create(&root, "t").unwrap();
        let x = graph.create(&root, "x").unwrap();
        let y = graph.create(&root, "y").unwrap();
        let z = graph.create(&root, "z").unwrap();

        assert_eq!(graph.replace_implied_tags(&t, &[x.clone(), y.clone()]), 2);
        assert_eq!(
            graph.replace_implied_tags(&t, &[y.clone(), z.clone()]),
            2 // x removed, z added, y untouched
        );
        assert_eq!(graph.tag(&t).unwrap().implied_tags, vec![y.clone(), z.clone()]);
        assert!(graph.tag(&x).unwrap().implied_by_tags.is_empty());
    }

    #[tokio::test]
    async fn replace_with_current_set_is_a_no_op() {
        let (mut graph, store, mut rx) = channel_graph().await;
        let root = graph.root_id().clone();
        let t = graph.create(&root, "t").unwrap();
        let x = graph.create(&root, "x").unwrap();
        graph.add_implied_tag(&t, &x);
        graph.bridge().flush().await;
        drain_events(&mut rx);
        let saves_before = store.save_count();

        let current = graph.tag(&t).unwrap().implied_tags.clone();
        assert_eq!(graph.replace_implied_tags(&t, &current), 0);
        graph.bridge().flush().await;

        assert_eq!(store.save_count(), saves_before);
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn replace_implied_by_mutates_the_other_side() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let t = graph.create(&root, "t").unwrap();
        let x = graph.create(&root, "x").unwrap();
        let y = graph.create(&root, "y").unwrap();

        assert_eq!(graph.replace_implied_by_tags(&t, &[x.clone()]), 1);
        assert_eq!(graph.tag(&x).unwrap().implied_tags, vec![t.clone()]);

        assert_eq!(graph.replace_implied_by_tags(&t, &[y.clone()]), 2);
        assert!(graph.tag(&x).unwrap().implied_tags.is_empty());
        assert_eq!(graph.tag(&y).unwrap().implied_tags, vec![t.clone()]);
    }

    #[tokio::test]
    async fn delete_removes_subtree_and_severs_implications() {
        let (mut graph, store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&a, "b").unwrap();
        let x = graph.create(&root, "x").unwrap();
        assert!(graph.add_implied_tag(&x, &b));
        graph.select(&b);

        graph.delete(&a).unwrap();
        assert!(graph.tag(&a).is_none());
        assert!(graph.tag(&b).is_none());
        assert!(graph.tag(&x).unwrap().implied_tags.is_empty());
        assert!(graph.selection().is_empty());
        assert_eq!(graph.tag_list(), &[x.clone()]);

        graph.bridge().flush().await;
        assert!(store.record(&a).is_none());
        assert!(store.record(&b).is_none());
        // x's severed forward edge was re-saved
        assert!(store.record(&x).unwrap().implied_tags.is_empty());
    }

    #[tokio::test]
    async fn delete_tags_collapses_overlapping_subtrees() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        let b = graph.create(&a, "b").unwrap();
        let c = graph.create(&root, "c").unwrap();

        graph.delete_tags(&[a.clone(), b.clone()]).unwrap();
        assert!(graph.tag(&a).is_none());
        assert!(graph.tag(&b).is_none());
        assert_eq!(graph.tag_list(), &[c]);
    }

    #[tokio::test]
    async fn root_cannot_be_deleted_or_moved() {
        let (mut graph, _store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();

        assert!(matches!(
            graph.delete(&root),
            Err(TrellisError::InvalidOperation(_))
        ));
        assert!(!graph.insert_sub_tag(&a, &root, 0));
    }

    #[tokio::test]
    async fn merge_with_children_fails_and_changes_nothing() {
        let (mut graph, ids) = sample_graph().await;
        let before = snapshot(&graph);

        let result = graph.merge(&ids["a"], &ids["d"]);
        assert!(matches!(result, Err(TrellisError::InvalidOperation(_))));
        assert_eq!(snapshot(&graph), before);
    }

    #[tokio::test]
    async fn merge_leaf_delegates_to_the_store() {
        let (mut graph, store) = memory_graph().await;
        let root = graph.root_id().clone();
        let keep = graph.create(&root, "keep").unwrap();
        let gone = graph.create(&root, "gone").unwrap();
        let x = graph.create(&root, "x").unwrap();
        assert!(graph.add_implied_tag(&x, &gone));

        graph.merge(&gone, &keep).unwrap();
        assert!(graph.tag(&gone).is_none());
        assert!(graph.tag(&x).unwrap().implied_tags.is_empty());
        assert_eq!(graph.tag_list(), &[keep.clone(), x.clone()]);

        graph.bridge().flush().await;
        assert_eq!(store.merge_calls(), vec![(gone, keep)]);
    }

    #[tokio::test]
    async fn hidden_toggle_fires_refetch_once() {
        let (mut graph, _store, mut rx) = channel_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        drain_events(&mut rx);

        graph.set_hidden(&a, true).unwrap();
        let events = drain_events(&mut rx);
        assert_eq!(events, vec![TagEvent::RefetchFiles]);

        // same value again: nothing to do
        graph.set_hidden(&a, true).unwrap();
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn file_count_is_a_saturating_cache() {
        let (mut graph, store) = memory_graph().await;
        let root = graph.root_id().clone();
        let a = graph.create(&root, "a").unwrap();
        graph.bridge().flush().await;
        let saves = store.save_count();

        graph.decrement_file_count(&a);
        assert_eq!(graph.tag(&a).unwrap().file_count, 0);
        graph.increment_file_count(&a);
        graph.increment_file_count(&a);
        assert_eq!(graph.tag(&a).unwrap().file_count, 2);

        // cache bumps never touch the backend
        graph.bridge().flush().await;
        assert_eq!(store.save_count(), saves);
    }

    #[tokio::test]
    async fn hydrate_reattaches_orphans_under_root() {
        use crate::bridge::{NullSink, PersistenceBridge};
        use crate::graph::test_support::record;
        use crate::storage::MemoryStore;

        let a = TagId::from_string("tag:a");
        let orphan = TagId::from_string("tag:orphan");
        let mut rec_root = record(&TagId::root(), "root");
        rec_root.sub_tags = vec![a.clone()];
        let records = vec![rec_root, record(&a, "a"), record(&orphan, "lost")];

        let store = Arc::new(MemoryStore::new());
        let bridge = PersistenceBridge::new(store, Arc::new(NullSink), Duration::from_millis(5));
        let graph = TagGraph::hydrate(GraphConfig::default(), bridge, records);

        assert_eq!(graph.tag(&orphan).unwrap().parent, *graph.root_id());
        assert_eq!(graph.tag_list(), &[a, orphan]);
    }
}
