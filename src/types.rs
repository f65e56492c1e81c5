// src/types.rs

use std::str::FromStr;
use serde::Deserialize;

/// How a node that is stale (or failed and stale) gets rebuilt.
///
/// - `Pipeline`: request a brand new pipeline run on the node's branch
///   (default behaviour).
/// - `RetryJobs`: retry each retained job of the node's current pipeline.
///   Nodes without any job still get a new pipeline, since there is nothing
///   to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStrategy {
    Pipeline,
    RetryJobs,
}

impl Default for RebuildStrategy {
    fn default() -> Self {
        RebuildStrategy::Pipeline
    }
}

impl FromStr for RebuildStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pipeline" => Ok(RebuildStrategy::Pipeline),
            "retry_jobs" => Ok(RebuildStrategy::RetryJobs),
            other => Err(format!(
                "invalid rebuild strategy: {other} (expected \"pipeline\" or \"retry_jobs\")"
            )),
        }
    }
}
