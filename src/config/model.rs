// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::Node;
use crate::types::RebuildStrategy;

/// Environment variable consulted when `[server].token` is absent.
pub const TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Configuration exactly as read from the TOML file.
///
/// ```toml
/// [server]
/// url = "https://gitlab.example.com"
///
/// [scheduler]
/// pause_secs = 30
/// job_filter = "build"
/// exclude_jobs = ["build-next"]
///
/// [dag]
/// "group/lib/master" = []
/// "group/app/master" = ["group/lib/master"]
/// ```
///
/// Only `[server]` and `[dag]` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub server: ServerSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Auto-run policy for `manual` jobs; absent means never.
    #[serde(default)]
    pub manual: Option<ManualSection>,

    /// Fixed variables passed to every triggered pipeline.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// `"group/project/branch" = [dependencies...]`.
    #[serde(default)]
    pub dag: BTreeMap<String, Vec<String>>,
}

/// Validated configuration.
///
/// Built through `TryFrom<RawConfigFile>` (see `config::validate`), so node
/// names are parsed and the DAG is known to be acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub scheduler: SchedulerSection,
    pub manual: Option<ManualSection>,
    pub variables: BTreeMap<String, String>,
    pub dag: BTreeMap<Node, Vec<Node>>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        dag: BTreeMap<Node, Vec<Node>>,
    ) -> Self {
        Self {
            server: raw.server,
            scheduler: raw.scheduler,
            manual: raw.manual,
            variables: raw.variables,
            dag,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Base URL of the GitLab instance.
    pub url: String,

    /// API token. Falls back to `$GITLAB_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServerSection {
    /// Token from the file, else from the environment.
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Pause between two sweeps.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,

    /// Regex on job names; only matching jobs count toward a node's status.
    /// If `None`, every job counts.
    #[serde(default)]
    pub job_filter: Option<String>,

    /// Job names that never count, even if they match `job_filter`.
    #[serde(default)]
    pub exclude_jobs: Vec<String>,

    #[serde(default)]
    pub rebuild: RebuildStrategy,
}

fn default_pause_secs() -> u64 {
    30
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            pause_secs: default_pause_secs(),
            job_filter: None,
            exclude_jobs: Vec::new(),
            rebuild: RebuildStrategy::default(),
        }
    }
}

/// `[manual]` section.
///
/// ```toml
/// [manual]
/// jobs = "^deploy"
/// weekdays = ["sat", "sun"]
/// from_hour = 2
/// to_hour = 6
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ManualSection {
    /// Regex of manual job names that may be started automatically.
    pub jobs: String,

    /// Local weekdays on which auto-run is allowed; empty means every day.
    #[serde(default)]
    pub weekdays: Vec<String>,

    /// Start of the allowed local hour window (inclusive).
    #[serde(default)]
    pub from_hour: u32,

    /// End of the allowed local hour window (exclusive).
    #[serde(default = "default_to_hour")]
    pub to_hour: u32,
}

fn default_to_hour() -> u32 {
    24
}
