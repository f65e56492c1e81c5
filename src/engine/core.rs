// src/engine/core.rs

//! One sweep over the project DAG.
//!
//! [`SweepEngine::sweep`] visits every node in topological order and, per
//! node:
//! 1. skips it if an upstream node locked it earlier in the sweep,
//! 2. fetches, branch-filters and de-duplicates its job statuses,
//! 3. auto-runs eligible manual jobs, keeps the relevant jobs and classifies,
//! 4. acts on the decision (lock / trigger / record finish time / retry if
//!    stale).
//!
//! The long-running loop, pauses and error recovery live in
//! [`super::runtime`].

use std::fmt;

use tracing::{debug, info, warn};

use crate::ci::{CiServer, CommitStatuses, ProjectId, StatusLabel, StatusRecord};
use crate::dag::{DagGraph, Node};
use crate::engine::Decision;
use crate::engine::cache::ProcessCache;
use crate::engine::classify::{
    Classification, classify, first_created_at, first_started_at, last_finished_at,
    latest_per_job, on_branch,
};
use crate::engine::policy::SchedulerPolicy;
use crate::engine::staleness::is_stale;
use crate::engine::sweep::{NodeOutcome, SweepReport, SweepState};
use crate::engine::trigger::PipelineTrigger;
use crate::errors::Result;
use crate::types::RebuildStrategy;

/// The status-classification and propagation engine.
///
/// Owns the (immutable) graph and its sweep order, the policy, the
/// process-lifetime cache and the CI server handle.
pub struct SweepEngine<S: CiServer> {
    graph: DagGraph,
    order: Vec<Node>,
    policy: SchedulerPolicy,
    cache: ProcessCache,
    ci: S,
}

impl<S: CiServer> fmt::Debug for SweepEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepEngine")
            .field("order", &self.order)
            .field("policy", &self.policy)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<S: CiServer> SweepEngine<S> {
    /// Fails with `DagCycle` if `graph` is not acyclic.
    pub fn new(graph: DagGraph, policy: SchedulerPolicy, ci: S) -> Result<Self> {
        let order = graph.topological_order()?;
        Ok(Self {
            graph,
            order,
            policy,
            cache: ProcessCache::new(),
            ci,
        })
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Sweep order (dependencies before dependents).
    pub fn order(&self) -> &[Node] {
        &self.order
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &ProcessCache {
        &self.cache
    }

    pub fn ci(&self) -> &S {
        &self.ci
    }

    pub fn ci_mut(&mut self) -> &mut S {
        &mut self.ci
    }

    /// Run one full sweep with a fresh [`SweepState`].
    ///
    /// The first error aborts the rest of the sweep. Locks taken and
    /// pipelines triggered before it are real external effects and are not
    /// undone; the next sweep starts from scratch.
    pub async fn sweep(&mut self) -> Result<SweepReport> {
        let mut state = SweepState::new();
        let mut outcomes = Vec::with_capacity(self.order.len());

        for idx in 0..self.order.len() {
            let node = self.order[idx].clone();

            // Must be checked right before each node: locks grow during the sweep.
            if state.locks.is_locked(&node) {
                debug!(node = %node, "node locked for this sweep; skipping");
                outcomes.push((node, NodeOutcome::LockedSkip));
                continue;
            }

            match self.process_node(&node, &mut state).await {
                Ok(outcome) => {
                    debug!(node = %node, ?outcome, "node processed");
                    outcomes.push((node, outcome));
                }
                Err(err) => {
                    warn!(node = %node, error = %err, "error while processing node; abandoning sweep");
                    return Err(err);
                }
            }
        }

        Ok(SweepReport { outcomes, state })
    }

    async fn process_node(&mut self, node: &Node, state: &mut SweepState) -> Result<NodeOutcome> {
        debug!(node = %node, "processing node");
        let project = self.cache.project_id(&self.ci, &node.project).await?;

        let Classification { decision, records } = match self.ci.fetch_statuses(project, &node.branch).await? {
            // No records means no own time: never stale, so a missing branch
            // stays unresolved until it exists again.
            CommitStatuses::NoCommit => {
                warn!(node = %node, "branch missing or repository empty; treating as needs-retry");
                Classification {
                    decision: Decision::NeedsRetry,
                    records: Vec::new(),
                }
            }
            CommitStatuses::Records(raw) => {
                let latest = latest_per_job(on_branch(raw, &node.branch));
                self.auto_run_manual(node, project, &latest).await?;
                let relevant: Vec<StatusRecord> = latest
                    .into_iter()
                    .filter(|r| (self.policy.job_filter)(r))
                    .collect();
                classify(relevant)
            }
        };
        debug!(node = %node, ?decision, jobs = records.len(), "classified node");

        match decision {
            Decision::Wait => {
                state.locks.lock(&self.graph, node);
                Ok(NodeOutcome::Wait)
            }
            Decision::Trigger => {
                info!(node = %node, "no jobs for current commit; requesting a pipeline");
                self.pipeline_trigger()
                    .trigger(node, project, &mut state.locks)
                    .await?;
                Ok(NodeOutcome::Triggered)
            }
            Decision::Success => {
                if let Some(finished) = last_finished_at(&records) {
                    debug!(node = %node, finished_at = %finished, "recording finish time");
                    state.finished_at.insert(node.clone(), finished);
                }
                let started = first_started_at(&records);
                if is_stale(&self.graph, node, started, &state.finished_at) {
                    info!(node = %node, ?started, "successful but older than a dependency; rebuilding");
                    self.rebuild(node, project, &records, state).await
                } else {
                    Ok(NodeOutcome::RecordedSuccess)
                }
            }
            Decision::NeedsRetry => {
                let created = first_created_at(&records);
                if is_stale(&self.graph, node, created, &state.finished_at) {
                    info!(node = %node, ?created, "unsuccessful and older than a dependency; rebuilding");
                    self.rebuild(node, project, &records, state).await
                } else {
                    debug!(node = %node, "unsuccessful but not stale; leaving unresolved");
                    Ok(NodeOutcome::Unresolved)
                }
            }
        }
    }

    async fn rebuild(
        &mut self,
        node: &Node,
        project: ProjectId,
        records: &[StatusRecord],
        state: &mut SweepState,
    ) -> Result<NodeOutcome> {
        let strategy = self.policy.rebuild;
        let mut trigger = self.pipeline_trigger();
        match strategy {
            RebuildStrategy::RetryJobs if !records.is_empty() => {
                let jobs = trigger.retry_jobs(node, project, records, &mut state.locks).await?;
                Ok(NodeOutcome::Retried { jobs })
            }
            _ => {
                trigger.trigger(node, project, &mut state.locks).await?;
                Ok(NodeOutcome::Triggered)
            }
        }
    }

    /// Start manual jobs the policy allows. Their status stays `manual` for
    /// the rest of this sweep.
    async fn auto_run_manual(
        &self,
        node: &Node,
        project: ProjectId,
        records: &[StatusRecord],
    ) -> Result<()> {
        for record in records.iter().filter(|r| r.status == StatusLabel::Manual) {
            if (self.policy.manual_eligibility)(node, &record.name) {
                info!(node = %node, job = %record.name, job_id = %record.id, "auto-running manual job");
                self.ci.run_job(project, record.id).await?;
            }
        }
        Ok(())
    }

    fn pipeline_trigger(&mut self) -> PipelineTrigger<'_, S> {
        PipelineTrigger::new(&self.ci, &mut self.cache, &self.graph, &self.policy)
    }
}
