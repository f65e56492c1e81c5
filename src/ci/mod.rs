// src/ci/mod.rs

//! CI server collaborator.
//!
//! The engine never talks HTTP itself; it goes through the [`CiServer`]
//! trait. Production uses [`gitlab::GitLabClient`]; tests plug in an
//! in-memory fake that records every call.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::Result;

pub mod gitlab;
pub mod model;

pub use gitlab::GitLabClient;
pub use model::{CommitStatuses, JobId, ProjectId, StatusLabel, StatusRecord, TriggerToken};

/// Operations the scheduler needs from the CI server.
///
/// All calls are awaited one at a time by the sweep; implementations do not
/// need to be re-entrant.
#[async_trait]
pub trait CiServer: Send + Sync {
    /// Resolve a project path (`group/project`) to its id.
    async fn resolve_project(&self, path: &str) -> Result<ProjectId>;

    /// Statuses of the latest commit of `branch`, or `NoCommit` if the
    /// branch is missing or the repository is empty.
    async fn fetch_statuses(&self, project: ProjectId, branch: &str) -> Result<CommitStatuses>;

    /// Start a `manual` job.
    async fn run_job(&self, project: ProjectId, job: JobId) -> Result<()>;

    /// Retry a finished job.
    async fn retry_job(&self, project: ProjectId, job: JobId) -> Result<()>;

    /// Return a usable pipeline trigger token, creating one if none exists.
    ///
    /// Must prefer an existing non-legacy trigger over creating a new one.
    async fn resolve_or_create_trigger(&self, project: ProjectId) -> Result<TriggerToken>;

    /// Start a new pipeline on `git_ref`.
    async fn run_pipeline(
        &self,
        project: ProjectId,
        git_ref: &str,
        token: &TriggerToken,
        variables: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Drop and recreate the underlying connection after a transport error.
    fn reconnect(&mut self) -> Result<()>;
}
