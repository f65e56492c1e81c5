use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use gitlab_ci_sched::ci::{
    CiServer, CommitStatuses, JobId, ProjectId, StatusRecord, TriggerToken,
};
use gitlab_ci_sched::dag::Node;
use gitlab_ci_sched::errors::{Result, SchedError};

/// One call made against the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiCall {
    ResolveProject(String),
    FetchStatuses { project: String, branch: String },
    RunJob { project: String, job: JobId },
    RetryJob { project: String, job: JobId },
    ResolveTrigger { project: String },
    CreateTrigger { project: String },
    RunPipeline {
        project: String,
        git_ref: String,
        token: String,
        variables: BTreeMap<String, String>,
    },
    Reconnect,
}

/// Error kinds that can be injected (`SchedError` is not `Clone`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedError {
    Connection,
    Api(u16),
    Other,
}

impl InjectedError {
    fn into_error(self) -> SchedError {
        match self {
            InjectedError::Connection => SchedError::Connection("injected: connection refused".into()),
            InjectedError::Api(status) => SchedError::Api {
                status,
                message: "injected API failure".into(),
            },
            InjectedError::Other => SchedError::Other(anyhow::anyhow!("injected failure")),
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    project_ids: HashMap<String, ProjectId>,
    statuses: HashMap<Node, CommitStatuses>,
    triggers: HashMap<String, String>,
    calls: Vec<CiCall>,
    fetch_errors: VecDeque<(Node, InjectedError)>,
    pipeline_errors: VecDeque<InjectedError>,
}

impl FakeState {
    fn path_of(&self, project: ProjectId) -> String {
        self.project_ids
            .iter()
            .find(|(_, id)| **id == project)
            .map(|(path, _)| path.clone())
            .unwrap_or_else(|| format!("<unknown {project}>"))
    }
}

/// In-memory CI server.
///
/// - statuses are set per node; nodes without statuses have a commit but no
///   jobs
/// - every call is recorded in order
/// - errors can be injected one-shot for a node's fetch or the next pipeline
///   trigger
///
/// Cloning shares the underlying state, so a test can keep a handle after
/// moving the server into the engine.
#[derive(Debug, Clone, Default)]
pub struct FakeCiServer {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCiServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_statuses(&self, node: &Node, records: Vec<StatusRecord>) {
        self.lock()
            .statuses
            .insert(node.clone(), CommitStatuses::Records(records));
    }

    pub fn set_no_commit(&self, node: &Node) {
        self.lock().statuses.insert(node.clone(), CommitStatuses::NoCommit);
    }

    pub fn with_existing_trigger(&self, project: &str, token: &str) {
        self.lock()
            .triggers
            .insert(project.to_string(), token.to_string());
    }

    pub fn fail_fetch(&self, node: &Node, err: InjectedError) {
        self.lock().fetch_errors.push_back((node.clone(), err));
    }

    pub fn fail_next_pipeline(&self, err: InjectedError) {
        self.lock().pipeline_errors.push_back(err);
    }

    pub fn calls(&self) -> Vec<CiCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// `(project, ref, variables)` of every pipeline triggered so far.
    pub fn pipelines(&self) -> Vec<(String, String, BTreeMap<String, String>)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                CiCall::RunPipeline {
                    project,
                    git_ref,
                    variables,
                    ..
                } => Some((project.clone(), git_ref.clone(), variables.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&CiCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl CiServer for FakeCiServer {
    async fn resolve_project(&self, path: &str) -> Result<ProjectId> {
        let mut state = self.lock();
        state.calls.push(CiCall::ResolveProject(path.to_string()));
        let next = ProjectId(state.project_ids.len() as u64 + 1);
        Ok(*state.project_ids.entry(path.to_string()).or_insert(next))
    }

    async fn fetch_statuses(&self, project: ProjectId, branch: &str) -> Result<CommitStatuses> {
        let mut state = self.lock();
        let path = state.path_of(project);
        state.calls.push(CiCall::FetchStatuses {
            project: path.clone(),
            branch: branch.to_string(),
        });

        let node = Node::new(path, branch);
        if let Some(pos) = state.fetch_errors.iter().position(|(n, _)| *n == node) {
            let (_, err) = state.fetch_errors.remove(pos).expect("position is valid");
            return Err(err.into_error());
        }

        Ok(state
            .statuses
            .get(&node)
            .cloned()
            .unwrap_or(CommitStatuses::Records(Vec::new())))
    }

    async fn run_job(&self, project: ProjectId, job: JobId) -> Result<()> {
        let mut state = self.lock();
        let project = state.path_of(project);
        state.calls.push(CiCall::RunJob { project, job });
        Ok(())
    }

    async fn retry_job(&self, project: ProjectId, job: JobId) -> Result<()> {
        let mut state = self.lock();
        let project = state.path_of(project);
        state.calls.push(CiCall::RetryJob { project, job });
        Ok(())
    }

    async fn resolve_or_create_trigger(&self, project: ProjectId) -> Result<TriggerToken> {
        let mut state = self.lock();
        let path = state.path_of(project);
        state.calls.push(CiCall::ResolveTrigger {
            project: path.clone(),
        });
        if let Some(token) = state.triggers.get(&path) {
            return Ok(TriggerToken(token.clone()));
        }
        let token = format!("token-{path}");
        state.triggers.insert(path.clone(), token.clone());
        state.calls.push(CiCall::CreateTrigger { project: path });
        Ok(TriggerToken(token))
    }

    async fn run_pipeline(
        &self,
        project: ProjectId,
        git_ref: &str,
        token: &TriggerToken,
        variables: &BTreeMap<String, String>,
    ) -> Result<()> {
        let mut state = self.lock();
        let path = state.path_of(project);
        state.calls.push(CiCall::RunPipeline {
            project: path,
            git_ref: git_ref.to_string(),
            token: token.0.clone(),
            variables: variables.clone(),
        });
        match state.pipeline_errors.pop_front() {
            Some(err) => Err(err.into_error()),
            None => Ok(()),
        }
    }

    fn reconnect(&mut self) -> Result<()> {
        self.lock().calls.push(CiCall::Reconnect);
        Ok(())
    }
}
