//! Depth-bounded, cycle-guarded graph traversal
//!
//! Every walk carries two sets: `visited` (nodes already yielded, so shared
//! subgraphs are not re-expanded) and `path` (nodes on the active recursion
//! stack). A node re-encountered while still on `path` is a true cycle: the
//! branch is truncated and a [`GraphWarning`] is raised instead of recursing
//! further. Walks also hard-stop at the configured depth ceiling. Tags are
//! loaded from external, possibly hand-edited backups, so these guards are
//! load-bearing, not defensive decoration.

use std::collections::HashSet;

use crate::bridge::GraphWarning;
use crate::graph::{Tag, TagGraph, TagId, COLOR_INHERIT};

/// Depth-first pre-order walk with cycle and depth guards.
///
/// `include_self` is false only for the top-level start node of ancestor
/// walks; every node reached through `neighbors` is yielded.
fn walk<N>(
    graph: &TagGraph,
    id: &TagId,
    depth: usize,
    include_self: bool,
    visited: &mut HashSet<TagId>,
    path: &mut HashSet<TagId>,
    out: &mut Vec<TagId>,
    warnings: &mut Vec<GraphWarning>,
    neighbors: &N,
) where
    N: Fn(&Tag) -> Vec<TagId>,
{
    let max_depth = graph.config().max_depth;
    if depth > max_depth {
        warnings.push(GraphWarning::depth_exceeded(
            id.clone(),
            format!("walk exceeded {} levels; truncating branch", max_depth),
        ));
        return;
    }
    if path.contains(id) {
        warnings.push(GraphWarning::corrupt(
            id.clone(),
            "cycle detected in tag graph; truncating branch",
        ));
        return;
    }
    if visited.contains(id) {
        // Reached again through a different branch; already yielded
        return;
    }
    let Some(tag) = graph.tag(id) else {
        // Dangling reference in persisted data; nothing to walk
        return;
    };

    visited.insert(id.clone());
    if include_self {
        out.push(id.clone());
    }
    path.insert(id.clone());
    for next in neighbors(tag) {
        walk(
            graph, &next, depth + 1, true, visited, path, out, warnings, neighbors,
        );
    }
    path.remove(id);
}

/// The tag followed by its whole subtree (tree edges only), pre-order
pub fn sub_tree(graph: &TagGraph, start: &TagId, warnings: &mut Vec<GraphWarning>) -> Vec<TagId> {
    let mut out = Vec::new();
    walk(
        graph,
        start,
        0,
        true,
        &mut HashSet::new(),
        &mut HashSet::new(),
        &mut out,
        warnings,
        &|tag| tag.sub_tags.clone(),
    );
    out
}

/// Parent, grandparent, … up to (excluding) root, nearest first.
///
/// The start tag itself is not part of the result, and the result length
/// never exceeds the configured depth ceiling.
pub fn ancestors(graph: &TagGraph, start: &TagId, warnings: &mut Vec<GraphWarning>) -> Vec<TagId> {
    let mut out = Vec::new();
    walk(
        graph,
        start,
        0,
        false,
        &mut HashSet::new(),
        &mut HashSet::new(),
        &mut out,
        warnings,
        &|tag| parent_edge(tag),
    );
    out
}

/// Union of tree children and backward implication edges, pre-order,
/// starting with the tag itself
pub fn implied_sub_tree(
    graph: &TagGraph,
    start: &TagId,
    warnings: &mut Vec<GraphWarning>,
) -> Vec<TagId> {
    let mut out = Vec::new();
    walk(
        graph,
        start,
        0,
        true,
        &mut HashSet::new(),
        &mut HashSet::new(),
        &mut out,
        warnings,
        &|tag| {
            let mut next = tag.sub_tags.clone();
            next.extend(tag.implied_by_tags.iter().cloned());
            next
        },
    );
    out
}

/// Closure of parent-chain and forward implication edges, excluding the
/// start tag and root.
///
/// `visited` is caller-supplied: resolving the closure for many tags in one
/// batch shares the set, so ground already covered by an earlier tag is not
/// re-walked. Nodes already in `visited` are neither re-yielded nor
/// re-expanded.
pub fn implied_ancestors(
    graph: &TagGraph,
    start: &TagId,
    visited: &mut HashSet<TagId>,
    warnings: &mut Vec<GraphWarning>,
) -> Vec<TagId> {
    let mut out = Vec::new();
    walk(
        graph,
        start,
        0,
        false,
        visited,
        &mut HashSet::new(),
        &mut out,
        warnings,
        &|tag| {
            let mut next = parent_edge(tag);
            next.extend(tag.implied_tags.iter().filter(|t| !t.is_root()).cloned());
            next
        },
    );
    out
}

fn parent_edge(tag: &Tag) -> Vec<TagId> {
    if tag.parent.is_root() || tag.is_root() {
        Vec::new()
    } else {
        vec![tag.parent.clone()]
    }
}

/// Names along the tree path, root excluded, ordered root→leaf, ending
/// with the tag's own name
pub fn path(graph: &TagGraph, start: &TagId, warnings: &mut Vec<GraphWarning>) -> Vec<String> {
    let mut names: Vec<String> = ancestors(graph, start, warnings)
        .iter()
        .rev()
        .filter_map(|id| graph.tag(id).map(|t| t.name.clone()))
        .collect();
    if let Some(tag) = graph.tag(start) {
        names.push(tag.name.clone());
    }
    names
}

/// The first concrete color found walking the tag then its ancestors;
/// falls back to the root's color
pub fn view_color(graph: &TagGraph, start: &TagId, warnings: &mut Vec<GraphWarning>) -> String {
    if let Some(tag) = graph.tag(start) {
        if tag.color != COLOR_INHERIT {
            return tag.color.clone();
        }
    }
    for id in ancestors(graph, start, warnings) {
        if let Some(tag) = graph.tag(&id) {
            if tag.color != COLOR_INHERIT {
                return tag.color.clone();
            }
        }
    }
    graph
        .tag(graph.root_id())
        .map(|root| root.color.clone())
        .unwrap_or_else(|| COLOR_INHERIT.to_string())
}

/// Sum of name lengths along [`path`]
pub fn path_char_length(
    graph: &TagGraph,
    start: &TagId,
    warnings: &mut Vec<GraphWarning>,
) -> usize {
    path(graph, start, warnings)
        .iter()
        .map(|name| name.len())
        .sum()
}
