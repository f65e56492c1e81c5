// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::RebuildStrategy;

/// Command-line arguments for `gitlab-ci-sched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "gitlab-ci-sched",
    version,
    about = "Trigger GitLab CI pipelines across projects with inter-project dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "gitlab-ci-sched.toml")]
    pub config: String,

    /// Run a single sweep over the DAG and exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GITLAB_CI_SCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[scheduler].rebuild` (`pipeline` or `retry_jobs`).
    #[arg(long, value_name = "STRATEGY")]
    pub rebuild: Option<RebuildStrategy>,

    /// Parse + validate, print the sweep order, but don't contact GitLab.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
