// src/config/validate.rs

use std::collections::BTreeMap;

use chrono::Weekday;
use regex::Regex;
use reqwest::Url;

use crate::config::model::{ConfigFile, ManualSection, RawConfigFile, SchedulerSection};
use crate::dag::{DagGraph, Node};
use crate::errors::{Result, SchedError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SchedError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let dag = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, dag))
    }
}

/// Run every check on a raw config without building a `ConfigFile`.
pub fn validate_config(raw: &RawConfigFile) -> Result<()> {
    validate_raw_config(raw).map(|_| ())
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<BTreeMap<Node, Vec<Node>>> {
    ensure_has_nodes(cfg)?;
    validate_server(cfg)?;
    validate_scheduler(&cfg.scheduler)?;
    if let Some(manual) = &cfg.manual {
        validate_manual(manual)?;
    }
    let dag = parse_dag(cfg)?;
    validate_dag(&dag)?;
    Ok(dag)
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.dag.is_empty() {
        return Err(SchedError::ConfigError(
            "config must contain at least one entry in [dag]".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    let url = Url::parse(&cfg.server.url).map_err(|e| {
        SchedError::ConfigError(format!("[server].url '{}' is not a URL: {e}", cfg.server.url))
    })?;
    if url.cannot_be_a_base() {
        return Err(SchedError::ConfigError(format!(
            "[server].url '{}' cannot be used as a base URL",
            cfg.server.url
        )));
    }
    if cfg.server.timeout_secs == 0 {
        return Err(SchedError::ConfigError(
            "[server].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler(sched: &SchedulerSection) -> Result<()> {
    if sched.pause_secs == 0 {
        return Err(SchedError::ConfigError(
            "[scheduler].pause_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(pattern) = &sched.job_filter {
        compile_regex(pattern, "[scheduler].job_filter")?;
    }
    Ok(())
}

fn validate_manual(manual: &ManualSection) -> Result<()> {
    compile_regex(&manual.jobs, "[manual].jobs")?;
    parse_weekdays(&manual.weekdays)?;
    if manual.from_hour >= manual.to_hour || manual.to_hour > 24 {
        return Err(SchedError::ConfigError(format!(
            "[manual] hour window {}..{} is invalid (need from_hour < to_hour <= 24)",
            manual.from_hour, manual.to_hour
        )));
    }
    Ok(())
}

fn parse_dag(cfg: &RawConfigFile) -> Result<BTreeMap<Node, Vec<Node>>> {
    let mut dag = BTreeMap::new();

    for (name, deps) in cfg.dag.iter() {
        let node: Node = name.parse()?;
        let mut parsed = Vec::with_capacity(deps.len());
        for dep in deps {
            let dep_node: Node = dep.parse()?;
            if dep_node == node {
                return Err(SchedError::DagCycle(format!(
                    "'{name}' cannot depend on itself"
                )));
            }
            parsed.push(dep_node);
        }
        if dag.insert(node.clone(), parsed).is_some() {
            return Err(SchedError::ConfigError(format!(
                "[dag] declares '{node}' more than once"
            )));
        }
    }

    Ok(dag)
}

fn validate_dag(dag: &BTreeMap<Node, Vec<Node>>) -> Result<()> {
    // Edge direction: dependency -> dependent. A topological sort fails on a
    // cycle.
    let mut graph = DagGraph::new();
    for (node, deps) in dag {
        graph.add_node(node.clone());
        for dep in deps {
            graph.add_edge(dep.clone(), node.clone());
        }
    }
    graph.validate()
}

pub(crate) fn compile_regex(pattern: &str, field: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| SchedError::ConfigError(format!("{field} is not a valid regex: {e}")))
}

pub(crate) fn parse_weekdays(days: &[String]) -> Result<Vec<Weekday>> {
    days.iter()
        .map(|d| {
            d.parse::<Weekday>().map_err(|_| {
                SchedError::ConfigError(format!(
                    "[manual].weekdays: unknown weekday '{d}' (expected e.g. \"mon\")"
                ))
            })
        })
        .collect()
}
