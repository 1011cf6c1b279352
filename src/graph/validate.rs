//! Pre-condition checks for structural mutations
//!
//! These gates run before any edit is applied; a failed check means the
//! mutator returns `false` with the graph untouched. Gates are silent —
//! corruption encountered here surfaces later through the query layer,
//! which owns diagnostics.

use std::collections::HashSet;

use super::engine::TagGraph;
use super::node::TagId;
use crate::query;

/// True iff `candidate` occurs strictly in `tag`'s parent chain
pub(crate) fn is_ancestor(graph: &TagGraph, tag: &TagId, candidate: &TagId) -> bool {
    if tag == candidate {
        return false;
    }
    let mut warnings = Vec::new();
    query::ancestors(graph, tag, &mut warnings).contains(candidate)
}

/// True iff `candidate` occurs strictly in `tag`'s implied-ancestor
/// closure: reachable over parent and implication edges through a path
/// containing at least one implication edge.
///
/// Paths made of parent edges alone are deliberately not counted — that
/// relation is [`is_ancestor`], and treating it the same here would make
/// every reorder and every move toward an ancestor illegal.
pub(crate) fn is_implied_ancestor(graph: &TagGraph, tag: &TagId, candidate: &TagId) -> bool {
    if tag == candidate {
        return false;
    }

    // The untainted spine: the tag and its plain ancestors. Implication
    // edges leaving the spine seed the closure.
    let mut warnings = Vec::new();
    let mut spine = vec![tag.clone()];
    spine.extend(query::ancestors(graph, tag, &mut warnings));

    let mut stack: Vec<TagId> = Vec::new();
    for id in &spine {
        if let Some(node) = graph.tag(id) {
            stack.extend(node.implied_tags.iter().filter(|t| !t.is_root()).cloned());
        }
    }

    // From a seed, both edge kinds stay in the closure: an implied tag's
    // own ancestors are implied as well.
    let mut visited: HashSet<TagId> = HashSet::new();
    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if id == *candidate {
            return true;
        }
        let Some(node) = graph.tag(&id) else {
            continue;
        };
        if !node.parent.is_root() && !node.is_root() {
            stack.push(node.parent.clone());
        }
        stack.extend(node.implied_tags.iter().filter(|t| !t.is_root()).cloned());
    }
    false
}
