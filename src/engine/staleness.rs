// src/engine/staleness.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::{DagGraph, Node};

/// Whether `node` must be rebuilt because a direct dependency finished after
/// the node's own evidence began.
///
/// `own_time` is the node's first job start (for successful nodes) or first
/// job creation (for failed/canceled nodes). `finished_at` holds the finish
/// times recorded for successful nodes earlier in the current sweep.
///
/// Not stale when:
/// - `own_time` is unknown,
/// - the node has no dependencies,
/// - any dependency has no finish time this sweep (it did not succeed, or
///   was locked before being evaluated).
pub fn is_stale(
    graph: &DagGraph,
    node: &Node,
    own_time: Option<DateTime<Utc>>,
    finished_at: &HashMap<Node, DateTime<Utc>>,
) -> bool {
    let Some(own_time) = own_time else {
        return false;
    };

    let mut last_parent: Option<DateTime<Utc>> = None;
    for pred in graph.predecessors(node) {
        let Some(&done) = finished_at.get(pred) else {
            debug!(node = %node, pred = %pred, "predecessor not finished this sweep; not stale");
            return false;
        };
        debug!(node = %node, pred = %pred, finished_at = %done, "predecessor finished");
        last_parent = Some(last_parent.map_or(done, |t| t.max(done)));
    }

    match last_parent {
        Some(parent) => own_time < parent,
        None => false,
    }
}
