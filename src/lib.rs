// src/lib.rs

pub mod ci;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod types;

use anyhow::Result;
use reqwest::Url;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::ci::gitlab::{GitLabClient, GitLabSettings};
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::{ConfigFile, TOKEN_ENV};
use crate::dag::DagGraph;
use crate::engine::{Runtime, SchedulerPolicy, SweepEngine, derive_variables};
use crate::errors::SchedError;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation (fatal on error), CLI overrides
/// - DAG + policy + GitLab client
/// - sweep engine and runtime loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(&args.config)?;
    if let Some(rebuild) = args.rebuild {
        cfg.scheduler.rebuild = rebuild;
    }
    let graph = DagGraph::from_config(&cfg);

    if args.dry_run {
        print_dry_run(&cfg, &graph)?;
        return Ok(());
    }

    let policy = SchedulerPolicy::from_config(&cfg)?;
    let client = GitLabClient::new(gitlab_settings(&cfg)?)?;
    let engine = SweepEngine::new(graph, policy, client)?;
    let mut runtime = Runtime::new(engine);

    if args.once {
        let report = runtime.run_once().await?;
        info!(
            nodes = report.outcomes.len(),
            rebuilt = report.rebuilt().len(),
            locked = report.state.locks.len(),
            "single sweep complete"
        );
        return Ok(());
    }

    // Ctrl-C → stop after the current sweep.
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(());
        });
    }

    runtime.run(shutdown_rx).await?;
    drop(shutdown_tx);
    Ok(())
}

fn gitlab_settings(cfg: &ConfigFile) -> std::result::Result<GitLabSettings, SchedError> {
    let url = Url::parse(&cfg.server.url)
        .map_err(|e| SchedError::ConfigError(format!("[server].url: {e}")))?;
    let token = cfg.server.resolved_token().ok_or_else(|| {
        SchedError::ConfigError(format!(
            "no GitLab token: set [server].token or the {TOKEN_ENV} environment variable"
        ))
    })?;

    Ok(GitLabSettings {
        url,
        token,
        timeout: cfg.server.timeout(),
    })
}

/// Print nodes in sweep order with their dependencies and the variables a
/// triggered pipeline would receive.
fn print_dry_run(cfg: &ConfigFile, graph: &DagGraph) -> Result<()> {
    let order = graph.topological_order()?;

    println!("gitlab-ci-sched dry-run");
    println!("  server.url = {}", cfg.server.url);
    println!("  scheduler.pause_secs = {}", cfg.scheduler.pause_secs);
    println!("  scheduler.rebuild = {:?}", cfg.scheduler.rebuild);
    if let Some(ref filter) = cfg.scheduler.job_filter {
        println!("  scheduler.job_filter = {filter}");
    }
    if !cfg.scheduler.exclude_jobs.is_empty() {
        println!("  scheduler.exclude_jobs = {:?}", cfg.scheduler.exclude_jobs);
    }
    println!();

    println!("nodes in sweep order ({}):", order.len());
    for node in &order {
        println!("  - {node}");
        let deps = graph.predecessors(node);
        if !deps.is_empty() {
            let names: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
            println!("      after: {names:?}");
        }
        let vars = derive_variables(graph, node, cfg.variables.clone());
        if !vars.is_empty() {
            println!("      variables: {vars:?}");
        }
    }

    debug!("dry-run complete (no GitLab calls)");
    Ok(())
}
