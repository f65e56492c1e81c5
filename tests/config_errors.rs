// tests/config_errors.rs

use std::error::Error;
use std::fs;

use tempfile::tempdir;

use gitlab_ci_sched::config::{ConfigFile, load_and_validate, load_from_str, validate_config};
use gitlab_ci_sched::dag::DagGraph;
use gitlab_ci_sched::errors::SchedError;
use gitlab_ci_sched::types::RebuildStrategy;
use gitlab_ci_sched_test_utils::builders::{ConfigFileBuilder, node};

type TestResult = Result<(), Box<dyn Error>>;

const VALID: &str = r#"
[server]
url = "https://gitlab.example.com"
token = "secret"

[scheduler]
pause_secs = 15
job_filter = "build"
exclude_jobs = ["build-next"]
rebuild = "retry_jobs"

[manual]
jobs = "^deploy"
weekdays = ["sat", "sun"]
from_hour = 2
to_hour = 6

[variables]
CI_SCHED = "1"

[dag]
"group/lib/master" = []
"group/api/feature/x" = ["group/lib/master"]
"group/web/master" = ["group/api/feature/x", "group/lib/master"]
"#;

#[test]
fn valid_config_loads_from_disk() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("gitlab-ci-sched.toml");
    fs::write(&path, VALID)?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.scheduler.pause_secs, 15);
    assert_eq!(cfg.scheduler.rebuild, RebuildStrategy::RetryJobs);
    assert_eq!(cfg.scheduler.exclude_jobs, vec!["build-next".to_string()]);
    assert_eq!(cfg.variables["CI_SCHED"], "1");
    assert_eq!(cfg.dag[&node("group/api/feature/x")], vec![node("group/lib/master")]);

    let graph = DagGraph::from_config(&cfg);
    assert_eq!(graph.len(), 3);
    let order = graph.topological_order()?;
    assert_eq!(order.first(), Some(&node("group/lib/master")));
    assert_eq!(order.last(), Some(&node("group/web/master")));
    Ok(())
}

#[test]
fn defaults_apply_to_optional_sections() -> TestResult {
    let raw = load_from_str(
        r#"
[server]
url = "https://gitlab.example.com"

[dag]
"g/a/master" = []
"#,
    )?;
    let cfg = ConfigFile::try_from(raw)?;
    assert_eq!(cfg.scheduler.pause_secs, 30);
    assert_eq!(cfg.scheduler.rebuild, RebuildStrategy::Pipeline);
    assert!(cfg.scheduler.job_filter.is_none());
    assert!(cfg.manual.is_none());
    assert_eq!(cfg.server.timeout_secs, 30);
    Ok(())
}

#[test]
fn dependencies_become_nodes_even_without_their_own_entry() {
    let cfg = ConfigFileBuilder::new()
        .with_node("g/app/master", &["g/lib/master"])
        .build();
    let graph = DagGraph::from_config(&cfg);

    assert!(graph.contains(&node("g/lib/master")));
    assert_eq!(graph.predecessors(&node("g/app/master")), vec![&node("g/lib/master")]);
}

#[test]
fn cycle_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_node("g/a/master", &["g/b/master"])
        .with_node("g/b/master", &["g/a/master"])
        .build_raw();

    let err = validate_config(&raw).unwrap_err();
    assert!(matches!(err, SchedError::DagCycle(_)), "got {err:?}");
}

#[test]
fn self_dependency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_node("g/a/master", &["g/a/master"])
        .build_raw();

    assert!(matches!(validate_config(&raw), Err(SchedError::DagCycle(_))));
}

#[test]
fn malformed_node_names_are_rejected() {
    for bad in ["just-a-project", "group/project", "/a/b", "a//b"] {
        let raw = ConfigFileBuilder::new().with_node(bad, &[]).build_raw();
        assert!(
            matches!(validate_config(&raw), Err(SchedError::MalformedNode(_))),
            "{bad} should be rejected"
        );
    }

    let raw = ConfigFileBuilder::new()
        .with_node("g/a/master", &["nope"])
        .build_raw();
    assert!(matches!(validate_config(&raw), Err(SchedError::MalformedNode(_))));
}

#[test]
fn same_node_declared_twice_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_node("g/app/master", &["g/lib/master"])
        .with_node(" g/app/master", &[])
        .build_raw();

    let err = validate_config(&raw).unwrap_err();
    assert!(err.is_config(), "got {err:?}");
    assert!(err.to_string().contains("more than once"));
}

#[test]
fn branch_may_contain_slashes() {
    let n = node("group/api/feature/deep/x");
    assert_eq!(n.project, "group/api");
    assert_eq!(n.branch, "feature/deep/x");
    assert_eq!(n.to_string(), "group/api/feature/deep/x");
}

#[test]
fn invalid_policy_settings_are_config_errors() {
    let cases = [
        ConfigFileBuilder::new().with_job_filter("(unclosed"),
        ConfigFileBuilder::new().with_pause_secs(0),
        ConfigFileBuilder::new().with_manual("deploy", &["funday"], 0, 24),
        ConfigFileBuilder::new().with_manual("deploy", &[], 6, 2),
        ConfigFileBuilder::new().with_manual("[", &[], 0, 24),
    ];

    for builder in cases {
        let raw = builder.with_node("g/a/master", &[]).build_raw();
        let err = validate_config(&raw).unwrap_err();
        assert!(err.is_config(), "expected config error, got {err:?}");
    }
}

#[test]
fn empty_dag_is_rejected() {
    let raw = ConfigFileBuilder::new().build_raw();
    assert!(validate_config(&raw).unwrap_err().is_config());
}

#[test]
fn unparsable_toml_is_a_toml_error() {
    let err = load_from_str("[server\nurl = 1").unwrap_err();
    assert!(matches!(err, SchedError::TomlError(_)));
}
