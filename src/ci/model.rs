// src/ci/model.rs

//! Status records and identifiers exchanged with the CI server.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Numeric project id on the CI server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id of a single job record, used to play or retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Long-lived credential used to start pipelines for one project.
#[derive(Clone, PartialEq, Eq)]
pub struct TriggerToken(pub String);

// Never print the token itself.
impl fmt::Debug for TriggerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TriggerToken(***)")
    }
}

/// Status label of a job.
///
/// GitLab has a few more transient states than the core vocabulary; they are
/// folded into `Pending` since they all mean "queued, not finished". Labels
/// this crate does not know yet decode as `Unknown`, which counts as in
/// flight so only the node's own cone waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Created,
    #[serde(alias = "waiting_for_resource", alias = "preparing", alias = "scheduled")]
    Pending,
    Running,
    Success,
    Failed,
    #[serde(alias = "canceling")]
    Canceled,
    Skipped,
    Manual,
    #[serde(other)]
    Unknown,
}

impl StatusLabel {
    /// Job is queued or executing.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            StatusLabel::Created
                | StatusLabel::Pending
                | StatusLabel::Running
                | StatusLabel::Unknown
        )
    }

    /// Job is terminal but did not produce a usable result.
    pub fn is_unsatisfactory(self) -> bool {
        matches!(
            self,
            StatusLabel::Canceled | StatusLabel::Skipped | StatusLabel::Manual | StatusLabel::Failed
        )
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusLabel::Created => "created",
            StatusLabel::Pending => "pending",
            StatusLabel::Running => "running",
            StatusLabel::Success => "success",
            StatusLabel::Failed => "failed",
            StatusLabel::Canceled => "canceled",
            StatusLabel::Skipped => "skipped",
            StatusLabel::Manual => "manual",
            StatusLabel::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One observed job result for a node's current commit.
///
/// Field names follow the GitLab commit status payload so that records can
/// be deserialized directly from the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusRecord {
    pub id: JobId,
    /// Job name, used for de-duplication.
    pub name: String,
    pub status: StatusLabel,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Ref the status was computed against.
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
}

/// Result of looking up the statuses of a node's latest commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatuses {
    /// The branch does not exist or the repository has no commits.
    NoCommit,
    /// All records visible for the commit (any ref sharing it).
    Records(Vec<StatusRecord>),
}
