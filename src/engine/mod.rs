// src/engine/mod.rs

//! Scheduling engine for gitlab-ci-sched.
//!
//! This module ties together:
//! - status classification ([`classify`]) and staleness ([`staleness`]),
//! - trigger variable derivation ([`variables`]) and rebuild requests
//!   ([`trigger`]),
//! - the process-lifetime id/token cache ([`cache`]),
//! - pluggable deployment policy ([`policy`]),
//! - a single sweep over the DAG ([`core`], [`sweep`]),
//! - the forever loop with pauses, error recovery and shutdown
//!   ([`runtime`]).

/// Per-node decision derived from its job statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Jobs still in flight: do not disturb, lock descendants.
    Wait,
    /// No relevant job exists for the current commit: request a pipeline.
    Trigger,
    /// Finished, but some job failed / was canceled / skipped / is manual.
    NeedsRetry,
    /// Every relevant job succeeded.
    Success,
}

pub mod cache;
pub mod classify;
pub mod core;
pub mod policy;
pub mod runtime;
pub mod staleness;
pub mod sweep;
pub mod trigger;
pub mod variables;

pub use cache::ProcessCache;
pub use classify::{Classification, classify, latest_per_job};
pub use self::core::SweepEngine;
pub use policy::{JobNameFilter, ManualWindow, SchedulerPolicy};
pub use runtime::{Runtime, pause_after};
pub use staleness::is_stale;
pub use sweep::{NodeOutcome, SweepReport, SweepState};
pub use trigger::PipelineTrigger;
pub use variables::{derive_variables, ref_variable_name, ref_variable_value};
