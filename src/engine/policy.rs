// src/engine/policy.rs

//! Pluggable scheduling policy.
//!
//! Deployment-specific behaviour (which jobs count, when manual jobs may be
//! started, how long to pause, extra pipeline variables, how to rebuild) is
//! injected as strategy values instead of being hard-wired in the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{Datelike, Local, Timelike, Weekday};
use regex::Regex;

use crate::ci::StatusRecord;
use crate::config::ConfigFile;
use crate::config::model::{ManualSection, SchedulerSection};
use crate::config::validate::{compile_regex, parse_weekdays};
use crate::dag::Node;
use crate::errors::Result;
use crate::types::RebuildStrategy;

pub type JobFilter = Box<dyn Fn(&StatusRecord) -> bool + Send + Sync>;
pub type ManualEligibility = Box<dyn Fn(&Node, &str) -> bool + Send + Sync>;
pub type VariableSupplier = Box<dyn Fn(&Node) -> BTreeMap<String, String> + Send + Sync>;

/// Strategy values the sweep consults.
pub struct SchedulerPolicy {
    /// Which records count toward a node's aggregate status.
    pub job_filter: JobFilter,
    /// Whether a `manual` job of a node may be started automatically.
    pub manual_eligibility: ManualEligibility,
    /// Pause between sweeps.
    pub pause: Duration,
    /// Fixed variables for a triggered node's pipeline.
    pub extra_variables: VariableSupplier,
    pub rebuild: RebuildStrategy,
}

impl Default for SchedulerPolicy {
    /// Every job counts, manual jobs are never started, 30 s pause.
    fn default() -> Self {
        Self {
            job_filter: Box::new(|_| true),
            manual_eligibility: Box::new(|_, _| false),
            pause: Duration::from_secs(30),
            extra_variables: Box::new(|_| BTreeMap::new()),
            rebuild: RebuildStrategy::default(),
        }
    }
}

impl fmt::Debug for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerPolicy")
            .field("pause", &self.pause)
            .field("rebuild", &self.rebuild)
            .finish_non_exhaustive()
    }
}

impl SchedulerPolicy {
    /// Build the policy described by `[scheduler]`, `[manual]` and
    /// `[variables]`.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let filter = JobNameFilter::from_section(&cfg.scheduler)?;
        let manual_eligibility: ManualEligibility = match &cfg.manual {
            Some(section) => {
                let window = ManualWindow::from_section(section)?;
                Box::new(move |_, job| window.allows(job, &Local::now()))
            }
            None => Box::new(|_, _| false),
        };
        let fixed = cfg.variables.clone();

        Ok(Self {
            job_filter: Box::new(move |r| filter.matches(&r.name)),
            manual_eligibility,
            pause: Duration::from_secs(cfg.scheduler.pause_secs),
            extra_variables: Box::new(move |_| fixed.clone()),
            rebuild: cfg.scheduler.rebuild,
        })
    }

    pub fn with_job_filter(
        mut self,
        filter: impl Fn(&StatusRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.job_filter = Box::new(filter);
        self
    }

    pub fn with_manual_eligibility(
        mut self,
        eligible: impl Fn(&Node, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.manual_eligibility = Box::new(eligible);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_extra_variables(
        mut self,
        supplier: impl Fn(&Node) -> BTreeMap<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.extra_variables = Box::new(supplier);
        self
    }

    pub fn with_rebuild(mut self, rebuild: RebuildStrategy) -> Self {
        self.rebuild = rebuild;
        self
    }
}

/// Job-name based relevance filter.
///
/// A job is relevant when it matches `include` (or there is no `include`)
/// and is not listed in `exclude`. For example `include = "build"`,
/// `exclude = ["build-next"]` keeps the build jobs but ignores the job that
/// kicks off downstream projects.
#[derive(Debug, Clone, Default)]
pub struct JobNameFilter {
    include: Option<Regex>,
    exclude: Vec<String>,
}

impl JobNameFilter {
    pub fn new(include: Option<Regex>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn from_section(section: &SchedulerSection) -> Result<Self> {
        let include = section
            .job_filter
            .as_deref()
            .map(|p| compile_regex(p, "[scheduler].job_filter"))
            .transpose()?;
        Ok(Self::new(include, section.exclude_jobs.clone()))
    }

    pub fn matches(&self, job: &str) -> bool {
        if self.exclude.iter().any(|e| e == job) {
            return false;
        }
        self.include.as_ref().is_none_or(|re| re.is_match(job))
    }
}

/// Time window in which matching manual jobs may be auto-run.
#[derive(Debug, Clone)]
pub struct ManualWindow {
    jobs: Regex,
    weekdays: Vec<Weekday>,
    from_hour: u32,
    to_hour: u32,
}

impl ManualWindow {
    pub fn new(jobs: Regex, weekdays: Vec<Weekday>, from_hour: u32, to_hour: u32) -> Self {
        Self {
            jobs,
            weekdays,
            from_hour,
            to_hour,
        }
    }

    pub fn from_section(section: &ManualSection) -> Result<Self> {
        Ok(Self::new(
            compile_regex(&section.jobs, "[manual].jobs")?,
            parse_weekdays(&section.weekdays)?,
            section.from_hour,
            section.to_hour,
        ))
    }

    /// Whether `job` may be started at local time `at`.
    pub fn allows<T: Datelike + Timelike>(&self, job: &str, at: &T) -> bool {
        if !self.jobs.is_match(job) {
            return false;
        }
        if !self.weekdays.is_empty() && !self.weekdays.contains(&at.weekday()) {
            return false;
        }
        (self.from_hour..self.to_hour).contains(&at.hour())
    }
}
