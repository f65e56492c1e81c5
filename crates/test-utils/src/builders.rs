#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use gitlab_ci_sched::ci::{JobId, StatusLabel, StatusRecord};
use gitlab_ci_sched::config::{ConfigFile, ManualSection, RawConfigFile, SchedulerSection, ServerSection};
use gitlab_ci_sched::dag::{DagGraph, Node};
use gitlab_ci_sched::types::RebuildStrategy;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Parse a `group/project/branch` node name, panicking on bad input.
pub fn node(name: &str) -> Node {
    name.parse().expect("valid node name in test")
}

/// `HH:MM` on a fixed day (2024-01-01, UTC).
pub fn at(hhmm: &str) -> DateTime<Utc> {
    let (h, m) = hhmm.split_once(':').expect("HH:MM");
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(h.parse().expect("hour"), m.parse().expect("minute"), 0))
        .expect("valid time")
        .and_utc()
}

/// Build a graph from `(node, [dependencies])` pairs.
pub fn graph(entries: &[(&str, &[&str])]) -> DagGraph {
    let mut g = DagGraph::new();
    for (name, deps) in entries {
        g.add_node(node(name));
        for dep in deps.iter() {
            g.add_edge(node(dep), node(name));
        }
    }
    g
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                server: ServerSection {
                    url: "https://gitlab.example.com".to_string(),
                    token: Some("test-token".to_string()),
                    timeout_secs: 30,
                },
                scheduler: SchedulerSection::default(),
                manual: None,
                variables: BTreeMap::new(),
                dag: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, deps: &[&str]) -> Self {
        self.config
            .dag
            .insert(name.to_string(), deps.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_pause_secs(mut self, secs: u64) -> Self {
        self.config.scheduler.pause_secs = secs;
        self
    }

    pub fn with_job_filter(mut self, pattern: &str) -> Self {
        self.config.scheduler.job_filter = Some(pattern.to_string());
        self
    }

    pub fn with_excluded_job(mut self, job: &str) -> Self {
        self.config.scheduler.exclude_jobs.push(job.to_string());
        self
    }

    pub fn with_rebuild(mut self, rebuild: RebuildStrategy) -> Self {
        self.config.scheduler.rebuild = rebuild;
        self
    }

    pub fn with_manual(mut self, jobs: &str, weekdays: &[&str], from_hour: u32, to_hour: u32) -> Self {
        self.config.manual = Some(ManualSection {
            jobs: jobs.to_string(),
            weekdays: weekdays.iter().map(|d| d.to_string()).collect(),
            from_hour,
            to_hour,
        });
        self
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.config.variables.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StatusRecord`.
pub struct RecordBuilder {
    record: StatusRecord,
}

impl RecordBuilder {
    /// New record created at 00:00 on the test day, with a fresh job id.
    pub fn new(name: &str, status: StatusLabel) -> Self {
        Self {
            record: StatusRecord {
                id: JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)),
                name: name.to_string(),
                status,
                created_at: at("00:00"),
                started_at: None,
                finished_at: None,
                git_ref: None,
            },
        }
    }

    pub fn id(mut self, id: u64) -> Self {
        self.record.id = JobId(id);
        self
    }

    pub fn created(mut self, hhmm: &str) -> Self {
        self.record.created_at = at(hhmm);
        self
    }

    pub fn started(mut self, hhmm: &str) -> Self {
        self.record.started_at = Some(at(hhmm));
        self
    }

    pub fn finished(mut self, hhmm: &str) -> Self {
        self.record.finished_at = Some(at(hhmm));
        self
    }

    pub fn on_ref(mut self, git_ref: &str) -> Self {
        self.record.git_ref = Some(git_ref.to_string());
        self
    }

    pub fn build(self) -> StatusRecord {
        self.record
    }
}

/// A successful job that ran `created`..`finished`, started at `created`.
pub fn success(name: &str, created: &str, finished: &str) -> StatusRecord {
    RecordBuilder::new(name, StatusLabel::Success)
        .created(created)
        .started(created)
        .finished(finished)
        .build()
}
