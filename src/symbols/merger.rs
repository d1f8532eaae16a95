//! Folding embedded symbol trees into the host tree
//!
//! Every inserted node lands under the deepest existing node containing it.
//! Siblings are kept ordered by start offset (host before embedded on ties,
//! then insertion order) and never overlap: a node partially overlapping a
//! sibling is clipped at the sibling's boundary.

use tracing::{debug, trace};

use super::node::SymbolNode;
use crate::language_regions::PositionMapping;

/// Merges host symbols with per-region embedded trees.
///
/// Embedded trees are in content coordinates and are translated through their
/// region's mapping before insertion. Re-merging nodes already present in the
/// result does not duplicate them.
pub fn merge(host: Vec<SymbolNode>, embedded: &[(PositionMapping, Vec<SymbolNode>)]) -> Vec<SymbolNode> {
    let mut roots = normalize(host);
    let mut inserted = 0;

    for (mapping, nodes) in embedded {
        for node in nodes {
            let mut node = node.clone().translated(mapping);
            node.children = normalize(std::mem::take(&mut node.children));
            insert(&mut roots, node);
            inserted += 1;
        }
    }

    debug!("Merged {} embedded root(s) into {} root(s)", inserted, roots.len());
    roots
}

/// Re-inserts every node of `nodes` (children first) so the ordering and
/// nesting rules hold for trees of unknown shape.
pub fn normalize(nodes: Vec<SymbolNode>) -> Vec<SymbolNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        node.children = normalize(std::mem::take(&mut node.children));
        insert(&mut out, node);
    }
    out
}

/// Inserts `node` into an ordered, non-overlapping sibling list.
pub fn insert(siblings: &mut Vec<SymbolNode>, mut node: SymbolNode) {
    if let Some(existing) = siblings.iter_mut().find(|s| s.same_entry(&node)) {
        for child in std::mem::take(&mut node.children) {
            insert(&mut existing.children, child);
        }
        return;
    }

    if let Some(parent) = siblings.iter_mut().find(|s| s.contains(&node)) {
        trace!("Nesting '{}' under '{}'", node.name, parent.name);
        insert(&mut parent.children, node);
        return;
    }

    // Node starts inside a sibling and runs past it
    if let Some(parent) = siblings
        .iter_mut()
        .find(|s| s.start < node.start && node.start < s.end)
    {
        trace!("Clipping '{}' to end of '{}' at {}", node.name, parent.name, parent.end);
        clip(&mut node, parent.end);
        insert(&mut parent.children, node);
        return;
    }

    // Node starts first; stop it where the first straddling sibling begins
    if let Some(boundary) = siblings
        .iter()
        .filter(|s| s.overlaps(&node) && !node.contains(s))
        .map(|s| s.start)
        .min()
    {
        trace!("Clipping '{}' at sibling start {}", node.name, boundary);
        clip(&mut node, boundary);
    }

    let mut kept = Vec::with_capacity(siblings.len());
    for sibling in siblings.drain(..) {
        if node.contains(&sibling) {
            insert(&mut node.children, sibling);
        } else {
            kept.push(sibling);
        }
    }
    *siblings = kept;

    let key = (node.start, node.origin);
    let at = siblings
        .iter()
        .position(|s| (s.start, s.origin) > key)
        .unwrap_or(siblings.len());
    siblings.insert(at, node);
}

fn clip(node: &mut SymbolNode, end: usize) {
    node.end = node.end.min(end);
    node.start = node.start.min(node.end);
    for child in &mut node.children {
        clip(child, end);
    }
}
