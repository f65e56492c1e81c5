// src/engine/classify.rs

//! Status classification.
//!
//! Turns the raw records of a node's current commit into a single
//! [`Decision`]. Everything here is pure; the sweep feeds it records and acts
//! on the result.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::ci::StatusRecord;
use crate::engine::Decision;

/// Decision plus the records it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub decision: Decision,
    pub records: Vec<StatusRecord>,
}

/// Drop records computed against another ref than `branch`.
///
/// Records without a ref are kept.
pub fn on_branch(records: Vec<StatusRecord>, branch: &str) -> Vec<StatusRecord> {
    records
        .into_iter()
        .filter(|r| r.git_ref.as_deref().is_none_or(|git_ref| git_ref == branch))
        .collect()
}

/// Keep only the most recently created record per job name.
///
/// On equal creation times the record listed last wins. Output is sorted by
/// job name.
pub fn latest_per_job(records: Vec<StatusRecord>) -> Vec<StatusRecord> {
    let mut by_job: HashMap<String, StatusRecord> = HashMap::new();

    for record in records {
        match by_job.get(&record.name) {
            Some(kept) if kept.created_at > record.created_at => {}
            _ => {
                by_job.insert(record.name.clone(), record);
            }
        }
    }

    let mut latest: Vec<StatusRecord> = by_job.into_values().collect();
    latest.sort_by(|a, b| a.name.cmp(&b.name));
    latest
}

/// Classify de-duplicated, relevant records. First matching rule wins:
///
/// 1. no records: `Trigger`
/// 2. any job queued or running: `Wait`
/// 3. any job failed, canceled, skipped or manual: `NeedsRetry`
/// 4. otherwise every job succeeded: `Success`
pub fn classify(records: Vec<StatusRecord>) -> Classification {
    let decision = if records.is_empty() {
        Decision::Trigger
    } else if records.iter().any(|r| r.status.is_in_flight()) {
        Decision::Wait
    } else if records.iter().any(|r| r.status.is_unsatisfactory()) {
        Decision::NeedsRetry
    } else {
        Decision::Success
    };

    Classification { decision, records }
}

/// Latest finish time among `records`.
pub fn last_finished_at(records: &[StatusRecord]) -> Option<DateTime<Utc>> {
    records.iter().filter_map(|r| r.finished_at).max()
}

/// Earliest start time among `records`.
pub fn first_started_at(records: &[StatusRecord]) -> Option<DateTime<Utc>> {
    records.iter().filter_map(|r| r.started_at).min()
}

/// Earliest creation time among `records`.
pub fn first_created_at(records: &[StatusRecord]) -> Option<DateTime<Utc>> {
    records.iter().map(|r| r.created_at).min()
}
