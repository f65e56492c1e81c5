// src/engine/sweep.rs

//! Per-sweep state and the structured result of a sweep.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::dag::{LockSet, Node};

/// State owned by a single sweep and dropped at its end.
#[derive(Debug, Default)]
pub struct SweepState {
    /// Nodes that must not trigger or report completion this sweep.
    pub locks: LockSet,
    /// Last job finish time of nodes found successful this sweep.
    pub finished_at: HashMap<Node, DateTime<Utc>>,
}

impl SweepState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What happened to one node during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Skipped: locked by an upstream node earlier in the sweep.
    LockedSkip,
    /// Jobs still in flight; node and successors locked.
    Wait,
    /// A new pipeline was requested.
    Triggered,
    /// The node's jobs were retried (`retry_jobs` rebuild strategy).
    Retried { jobs: usize },
    /// Successful and fresh; finish time recorded for dependents.
    RecordedSuccess,
    /// Failed or unresolvable but not stale; left alone this sweep.
    Unresolved,
}

/// Structured result of one sweep.
///
/// Useful for logging and for tests that want to assert what a sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Outcome per node, in visit order.
    pub outcomes: Vec<(Node, NodeOutcome)>,
    /// Final per-sweep state.
    pub state: SweepState,
}

impl SweepReport {
    pub fn outcome_of(&self, node: &Node) -> Option<NodeOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == node)
            .map(|(_, outcome)| *outcome)
    }

    /// Nodes for which a rebuild (pipeline or job retry) was requested.
    pub fn rebuilt(&self) -> Vec<&Node> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NodeOutcome::Triggered | NodeOutcome::Retried { .. }))
            .map(|(n, _)| n)
            .collect()
    }

    pub fn is_locked(&self, node: &Node) -> bool {
        self.state.locks.is_locked(node)
    }

    pub fn finished_at(&self, node: &Node) -> Option<DateTime<Utc>> {
        self.state.finished_at.get(node).copied()
    }
}
