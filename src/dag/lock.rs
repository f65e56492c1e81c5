// src/dag/lock.rs

//! Per-sweep "do not build yet" markers.

use std::collections::HashSet;

use tracing::debug;

use crate::dag::graph::DagGraph;
use crate::dag::node::Node;

/// Nodes forbidden to trigger or report completion for the rest of a sweep.
///
/// Locking a node always locks every transitive successor as well, so once a
/// node is in the set its whole downstream cone is too.
#[derive(Debug, Clone, Default)]
pub struct LockSet {
    locked: HashSet<Node>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `node` and all of its transitive successors.
    ///
    /// Returns the nodes that were newly locked by this call (empty if `node`
    /// was already locked).
    pub fn lock(&mut self, graph: &DagGraph, node: &Node) -> Vec<Node> {
        if self.locked.contains(node) {
            return Vec::new();
        }

        let mut newly = Vec::new();
        if self.locked.insert(node.clone()) {
            newly.push(node.clone());
        }
        for succ in graph.descendants(node) {
            if self.locked.insert(succ.clone()) {
                newly.push(succ.clone());
            }
        }

        debug!(
            node = %node,
            newly_locked = newly.len(),
            "locked node and its successors for this sweep"
        );
        newly
    }

    pub fn is_locked(&self, node: &Node) -> bool {
        self.locked.contains(node)
    }

    pub fn len(&self) -> usize {
        self.locked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.locked.iter()
    }
}
