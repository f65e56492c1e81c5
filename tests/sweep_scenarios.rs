// tests/sweep_scenarios.rs

use std::collections::BTreeMap;
use std::error::Error;

use gitlab_ci_sched::ci::StatusLabel;
use gitlab_ci_sched::dag::DagGraph;
use gitlab_ci_sched::engine::{NodeOutcome, SchedulerPolicy, SweepEngine};
use gitlab_ci_sched::types::RebuildStrategy;
use gitlab_ci_sched_test_utils::builders::{RecordBuilder, at, graph, node, success};
use gitlab_ci_sched_test_utils::{CiCall, FakeCiServer, InjectedError, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

fn engine(g: DagGraph, ci: &FakeCiServer) -> SweepEngine<FakeCiServer> {
    engine_with(g, ci, SchedulerPolicy::default())
}

fn engine_with(g: DagGraph, ci: &FakeCiServer, policy: SchedulerPolicy) -> SweepEngine<FakeCiServer> {
    SweepEngine::new(g, policy, ci.clone()).expect("acyclic test graph")
}

fn chain() -> DagGraph {
    graph(&[
        ("g/a/master", &[]),
        ("g/b/master", &["g/a/master"]),
        ("g/c/master", &["g/b/master"]),
    ])
}

fn fetched(ci: &FakeCiServer, project: &str) -> bool {
    ci.count(|c| matches!(c, CiCall::FetchStatuses { project: p, .. } if p == project)) > 0
}

#[tokio::test]
async fn successful_node_older_than_dependency_is_retriggered() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[]), ("g/b/master", &["g/a/master"])]);
    ci.set_statuses(&node("g/a/master"), vec![success("build", "09:00", "10:00")]);
    ci.set_statuses(&node("g/b/master"), vec![success("build", "08:00", "08:30")]);

    let report = engine(g, &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/a/master")), Some(NodeOutcome::RecordedSuccess));
    assert_eq!(report.finished_at(&node("g/a/master")), Some(at("10:00")));
    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::Triggered));
    assert!(report.is_locked(&node("g/b/master")));
    assert!(!report.is_locked(&node("g/a/master")));

    let pipelines = ci.pipelines();
    assert_eq!(pipelines.len(), 1);
    let (project, git_ref, vars) = &pipelines[0];
    assert_eq!(project, "g/b");
    assert_eq!(git_ref, "master");
    assert_eq!(vars.get("REF_G_A").map(String::as_str), Some("master"));
    Ok(())
}

#[tokio::test]
async fn successful_node_newer_than_dependency_is_left_alone() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[]), ("g/b/master", &["g/a/master"])]);
    ci.set_statuses(&node("g/a/master"), vec![success("build", "09:00", "10:00")]);
    ci.set_statuses(&node("g/b/master"), vec![success("build", "10:30", "11:00")]);

    let report = engine(g, &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::RecordedSuccess));
    assert_eq!(report.finished_at(&node("g/b/master")), Some(at("11:00")));
    assert!(report.rebuilt().is_empty());
    assert!(ci.pipelines().is_empty());
    Ok(())
}

#[tokio::test]
async fn running_node_locks_successors_which_are_never_fetched() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    ci.set_statuses(
        &node("g/a/master"),
        vec![RecordBuilder::new("build", StatusLabel::Running).build()],
    );
    // Would be triggered if evaluated.
    ci.set_statuses(&node("g/b/master"), Vec::new());

    let report = engine(chain(), &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/a/master")), Some(NodeOutcome::Wait));
    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::LockedSkip));
    assert_eq!(report.outcome_of(&node("g/c/master")), Some(NodeOutcome::LockedSkip));
    assert!(report.is_locked(&node("g/c/master")));
    assert!(!fetched(&ci, "g/b"));
    assert!(!fetched(&ci, "g/c"));
    assert!(ci.pipelines().is_empty());
    Ok(())
}

#[tokio::test]
async fn node_without_records_is_triggered_with_direct_dependency_refs() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[
        ("g/core/master", &[]),
        ("g/lib/Feature/X-1", &["g/core/master"]),
        ("g/app/master", &["g/lib/Feature/X-1"]),
        ("g/tail/master", &["g/app/master"]),
    ]);
    ci.set_statuses(&node("g/core/master"), vec![success("build", "01:00", "02:00")]);
    ci.set_statuses(&node("g/lib/Feature/X-1"), vec![success("build", "03:00", "04:00")]);
    // g/app has a commit but no jobs.

    let report = engine(g, &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/app/master")), Some(NodeOutcome::Triggered));
    assert!(report.is_locked(&node("g/app/master")));
    assert_eq!(report.outcome_of(&node("g/tail/master")), Some(NodeOutcome::LockedSkip));

    let pipelines = ci.pipelines();
    assert_eq!(pipelines.len(), 1);
    assert_eq!(pipelines[0].0, "g/app");
    assert_eq!(
        pipelines[0].2,
        BTreeMap::from([("REF_G_LIB".to_string(), "feature-x-1".to_string())])
    );
    Ok(())
}

#[tokio::test]
async fn each_node_is_triggered_at_most_once_per_sweep() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    // Every node has no jobs: only the root may trigger, the rest are locked.
    let report = engine(chain(), &ci).sweep().await?;

    assert_eq!(report.rebuilt(), vec![&node("g/a/master")]);
    assert_eq!(ci.pipelines().len(), 1);
    Ok(())
}

#[tokio::test]
async fn stale_failed_node_is_rebuilt() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[]), ("g/b/master", &["g/a/master"])]);
    ci.set_statuses(&node("g/a/master"), vec![success("build", "09:00", "10:00")]);
    ci.set_statuses(
        &node("g/b/master"),
        vec![RecordBuilder::new("build", StatusLabel::Failed).created("08:00").build()],
    );

    let report = engine(g, &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::Triggered));
    assert_eq!(ci.pipelines().len(), 1);
    Ok(())
}

#[tokio::test]
async fn fresh_failure_is_unresolved_and_cascades_as_not_stale() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    ci.set_statuses(&node("g/a/master"), vec![success("build", "09:00", "10:00")]);
    // Created after a finished: a real failure of the current inputs.
    ci.set_statuses(
        &node("g/b/master"),
        vec![RecordBuilder::new("build", StatusLabel::Failed).created("10:30").build()],
    );
    // Older than everything upstream, but b has no finish time.
    ci.set_statuses(&node("g/c/master"), vec![success("build", "00:10", "00:20")]);

    let report = engine(chain(), &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::Unresolved));
    assert!(!report.is_locked(&node("g/b/master")));
    assert_eq!(report.finished_at(&node("g/b/master")), None);
    assert_eq!(report.outcome_of(&node("g/c/master")), Some(NodeOutcome::RecordedSuccess));
    assert!(ci.pipelines().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_branch_is_unresolved_without_trigger() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[]), ("g/b/master", &["g/a/master"])]);
    ci.set_no_commit(&node("g/a/master"));
    ci.set_statuses(&node("g/b/master"), vec![success("build", "00:00", "00:10")]);

    let report = engine(g, &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/a/master")), Some(NodeOutcome::Unresolved));
    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::RecordedSuccess));
    assert!(ci.pipelines().is_empty());
    Ok(())
}

#[tokio::test]
async fn irrelevant_jobs_are_ignored_by_the_job_filter() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[])]);
    ci.set_statuses(
        &node("g/a/master"),
        vec![
            success("build", "00:00", "00:10"),
            RecordBuilder::new("build-next", StatusLabel::Running).build(),
            RecordBuilder::new("docs", StatusLabel::Failed).build(),
        ],
    );
    let policy = SchedulerPolicy::default()
        .with_job_filter(|r| r.name.contains("build") && r.name != "build-next");

    let report = engine_with(g, &ci, policy).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/a/master")), Some(NodeOutcome::RecordedSuccess));
    Ok(())
}

#[tokio::test]
async fn records_from_other_refs_do_not_count() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[])]);
    ci.set_statuses(
        &node("g/a/master"),
        vec![
            RecordBuilder::new("build", StatusLabel::Running).on_ref("other").build(),
            RecordBuilder::new("build", StatusLabel::Success)
                .on_ref("master")
                .started("00:00")
                .finished("00:10")
                .build(),
        ],
    );

    let report = engine(g, &ci).sweep().await?;

    assert_eq!(report.outcome_of(&node("g/a/master")), Some(NodeOutcome::RecordedSuccess));
    Ok(())
}

#[tokio::test]
async fn eligible_manual_jobs_are_started() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[])]);
    ci.set_statuses(
        &node("g/a/master"),
        vec![
            RecordBuilder::new("deploy", StatusLabel::Manual).id(41).build(),
            RecordBuilder::new("publish", StatusLabel::Manual).id(42).build(),
            success("build", "00:00", "00:10"),
        ],
    );
    let policy = SchedulerPolicy::default().with_manual_eligibility(|_, job| job == "deploy");

    let report = engine_with(g, &ci, policy).sweep().await?;

    let run: Vec<CiCall> = ci
        .calls()
        .into_iter()
        .filter(|c| matches!(c, CiCall::RunJob { .. }))
        .collect();
    assert_eq!(run.len(), 1);
    assert!(matches!(&run[0], CiCall::RunJob { job, .. } if job.0 == 41));
    // Still manual this sweep; root node is never stale.
    assert_eq!(report.outcome_of(&node("g/a/master")), Some(NodeOutcome::Unresolved));
    Ok(())
}

#[tokio::test]
async fn retry_jobs_strategy_retries_instead_of_triggering() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[]), ("g/b/master", &["g/a/master"])]);
    ci.set_statuses(&node("g/a/master"), vec![success("build", "09:00", "10:00")]);
    ci.set_statuses(
        &node("g/b/master"),
        vec![
            RecordBuilder::new("build", StatusLabel::Success)
                .id(7)
                .started("08:00")
                .finished("08:10")
                .build(),
            RecordBuilder::new("test", StatusLabel::Success)
                .id(8)
                .started("08:10")
                .finished("08:20")
                .build(),
        ],
    );
    let policy = SchedulerPolicy::default().with_rebuild(RebuildStrategy::RetryJobs);

    let report = engine_with(g, &ci, policy).sweep().await?;

    assert_eq!(
        report.outcome_of(&node("g/b/master")),
        Some(NodeOutcome::Retried { jobs: 2 })
    );
    assert!(report.is_locked(&node("g/b/master")));
    assert!(ci.pipelines().is_empty());
    assert_eq!(ci.count(|c| matches!(c, CiCall::RetryJob { .. })), 2);
    Ok(())
}

#[tokio::test]
async fn project_ids_and_trigger_tokens_are_cached_across_sweeps() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[("g/a/master", &[]), ("g/a/develop", &[])]);
    let mut engine = engine(g, &ci);

    engine.sweep().await?;
    engine.sweep().await?;

    // Two branches of one project, two sweeps: one lookup, one credential.
    assert_eq!(ci.count(|c| matches!(c, CiCall::ResolveProject(_))), 1);
    assert_eq!(ci.count(|c| matches!(c, CiCall::ResolveTrigger { .. })), 1);
    assert_eq!(ci.count(|c| matches!(c, CiCall::CreateTrigger { .. })), 1);
    assert_eq!(ci.pipelines().len(), 4);
    assert!(engine.cache().cached_project("g/a").is_some());
    Ok(())
}

#[tokio::test]
async fn existing_trigger_is_reused() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    ci.with_existing_trigger("g/a", "existing");

    engine(graph(&[("g/a/master", &[])]), &ci).sweep().await?;

    assert_eq!(ci.count(|c| matches!(c, CiCall::CreateTrigger { .. })), 0);
    assert!(ci.calls().iter().any(
        |c| matches!(c, CiCall::RunPipeline { token, .. } if token == "existing")
    ));
    Ok(())
}

#[tokio::test]
async fn error_aborts_sweep_and_next_sweep_starts_fresh() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    let g = graph(&[
        ("g/a/master", &[]),
        ("g/b/master", &["g/a/master"]),
        ("g/z/master", &[]),
    ]);
    ci.set_statuses(&node("g/a/master"), vec![success("build", "09:00", "10:00")]);
    ci.set_statuses(&node("g/b/master"), vec![success("build", "10:00", "11:00")]);
    ci.set_statuses(&node("g/z/master"), vec![success("build", "09:00", "10:00")]);
    ci.fail_fetch(&node("g/b/master"), InjectedError::Connection);

    let mut engine = engine(g, &ci);
    let err = engine.sweep().await.expect_err("fetch of g/b fails");
    assert!(err.to_string().contains("connection"));

    // The next sweep starts from scratch and succeeds.
    let report = engine.sweep().await?;
    assert_eq!(report.outcome_of(&node("g/b/master")), Some(NodeOutcome::RecordedSuccess));
    Ok(())
}

#[tokio::test]
async fn failed_trigger_still_leaves_pipeline_request_recorded() -> TestResult {
    init_tracing();
    let ci = FakeCiServer::new();
    ci.fail_next_pipeline(InjectedError::Api(500));

    let mut engine = engine(graph(&[("g/a/master", &[])]), &ci);
    assert!(engine.sweep().await.is_err());
    assert_eq!(ci.pipelines().len(), 1);

    // Token was cached before the failing call.
    let project = engine.cache().cached_project("g/a").expect("project cached");
    assert!(engine.cache().has_trigger(project));
    engine.sweep().await?;
    assert_eq!(ci.count(|c| matches!(c, CiCall::CreateTrigger { .. })), 1);
    Ok(())
}
