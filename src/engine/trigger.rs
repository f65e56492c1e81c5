// src/engine/trigger.rs

//! Requesting rebuilds from the CI server.

use tracing::info;

use crate::ci::{CiServer, ProjectId, StatusRecord};
use crate::dag::{DagGraph, LockSet, Node};
use crate::engine::cache::ProcessCache;
use crate::engine::policy::SchedulerPolicy;
use crate::engine::variables::derive_variables;
use crate::errors::Result;

/// Borrowed view over everything needed to start a rebuild of one node.
pub struct PipelineTrigger<'a, S: CiServer + ?Sized> {
    ci: &'a S,
    cache: &'a mut ProcessCache,
    graph: &'a DagGraph,
    policy: &'a SchedulerPolicy,
}

impl<'a, S: CiServer + ?Sized> PipelineTrigger<'a, S> {
    pub fn new(
        ci: &'a S,
        cache: &'a mut ProcessCache,
        graph: &'a DagGraph,
        policy: &'a SchedulerPolicy,
    ) -> Self {
        Self {
            ci,
            cache,
            graph,
            policy,
        }
    }

    /// Start a new pipeline on `node`'s branch.
    ///
    /// The node and its successors are locked before any external call, so
    /// nothing downstream is evaluated against a commit that is about to be
    /// rebuilt, even if the call below fails.
    pub async fn trigger(
        &mut self,
        node: &Node,
        project: ProjectId,
        locks: &mut LockSet,
    ) -> Result<()> {
        locks.lock(self.graph, node);

        let token = self.cache.trigger_token(self.ci, project).await?;
        let variables = derive_variables(self.graph, node, (self.policy.extra_variables)(node));

        info!(
            node = %node,
            project_id = %project,
            variables = ?variables,
            "triggering pipeline"
        );
        self.ci
            .run_pipeline(project, &node.branch, &token, &variables)
            .await
    }

    /// Retry every job in `records`, after locking the node and its
    /// successors. Returns the number of jobs retried.
    pub async fn retry_jobs(
        &mut self,
        node: &Node,
        project: ProjectId,
        records: &[StatusRecord],
        locks: &mut LockSet,
    ) -> Result<usize> {
        locks.lock(self.graph, node);

        for record in records {
            info!(
                node = %node,
                job = %record.name,
                job_id = %record.id,
                status = %record.status,
                "retrying job"
            );
            self.ci.retry_job(project, record.id).await?;
        }
        Ok(records.len())
    }
}
