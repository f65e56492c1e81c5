// src/ci/gitlab.rs

//! GitLab v4 REST implementation of [`CiServer`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::ci::CiServer;
use crate::ci::model::{CommitStatuses, JobId, ProjectId, StatusRecord, TriggerToken};
use crate::errors::{Result, SchedError};

const PER_PAGE: usize = 100;
const TRIGGER_DESCRIPTION: &str = "gitlab-ci-sched";

/// Connection settings for [`GitLabClient`].
#[derive(Debug, Clone)]
pub struct GitLabSettings {
    pub url: Url,
    pub token: String,
    pub timeout: Duration,
}

/// GitLab API client.
///
/// Holds no caches of its own; project ids and trigger tokens are cached by
/// the engine's `ProcessCache`.
#[derive(Debug)]
pub struct GitLabClient {
    settings: GitLabSettings,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    id: ProjectId,
}

#[derive(Debug, Deserialize)]
struct BranchPayload {
    commit: CommitPayload,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    id: String,
}

/// A pipeline trigger as listed by `GET /projects/:id/triggers`.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerInfo {
    pub id: u64,
    pub token: String,
    /// Legacy triggers have no owner.
    #[serde(default)]
    pub owner: Option<serde_json::Value>,
}

impl TriggerInfo {
    pub fn is_legacy(&self) -> bool {
        self.owner.is_none()
    }
}

/// Pick the trigger to reuse: the first owned (non-legacy) one.
pub fn select_trigger(triggers: &[TriggerInfo]) -> Option<&TriggerInfo> {
    triggers.iter().find(|t| !t.is_legacy())
}

impl GitLabClient {
    pub fn new(settings: GitLabSettings) -> Result<Self> {
        let http = build_http_client(&settings)?;
        Ok(Self { settings, http })
    }

    /// `<base>/api/v4/<segments...>`, each segment percent-encoded (so a
    /// project path like `group/api` becomes a single `group%2Fapi` segment).
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.settings.url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SchedError::ConfigError(format!(
                    "server url '{}' cannot be used as a base URL",
                    self.settings.url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }

    async fn commit_of_branch(&self, project: ProjectId, branch: &str) -> Result<Option<String>> {
        let pid = project.to_string();
        let url = self.endpoint(&["projects", &pid, "repository", "branches", branch])?;
        let resp = self.http.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let branch: BranchPayload = ensure_success(resp, "fetching branch").await?.json().await?;
        Ok(Some(branch.commit.id))
    }

    async fn list_triggers(&self, project: ProjectId) -> Result<Vec<TriggerInfo>> {
        let pid = project.to_string();
        let url = self.endpoint(&["projects", &pid, "triggers"])?;
        let resp = self.http.get(url).send().await?;
        Ok(ensure_success(resp, "listing triggers").await?.json().await?)
    }
}

#[async_trait]
impl CiServer for GitLabClient {
    async fn resolve_project(&self, path: &str) -> Result<ProjectId> {
        let url = self.endpoint(&["projects", path])?;
        let resp = self.http.get(url).send().await?;
        let project: ProjectPayload = ensure_success(resp, "resolving project").await?.json().await?;
        debug!(project = %path, id = %project.id, "resolved project id");
        Ok(project.id)
    }

    async fn fetch_statuses(&self, project: ProjectId, branch: &str) -> Result<CommitStatuses> {
        let Some(sha) = self.commit_of_branch(project, branch).await? else {
            return Ok(CommitStatuses::NoCommit);
        };

        let pid = project.to_string();
        let url = self.endpoint(&["projects", &pid, "repository", "commits", &sha, "statuses"])?;

        let mut records: Vec<StatusRecord> = Vec::new();
        let mut page = 1usize;
        loop {
            let resp = self
                .http
                .get(url.clone())
                .query(&[
                    ("all", "true".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;
            let batch: Vec<StatusRecord> =
                ensure_success(resp, "listing commit statuses").await?.json().await?;
            let done = batch.len() < PER_PAGE;
            records.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        debug!(project = %project, %branch, %sha, count = records.len(), "fetched commit statuses");
        Ok(CommitStatuses::Records(records))
    }

    async fn run_job(&self, project: ProjectId, job: JobId) -> Result<()> {
        let (pid, jid) = (project.to_string(), job.to_string());
        let url = self.endpoint(&["projects", &pid, "jobs", &jid, "play"])?;
        let resp = self.http.post(url).send().await?;
        ensure_success(resp, "playing job").await?;
        Ok(())
    }

    async fn retry_job(&self, project: ProjectId, job: JobId) -> Result<()> {
        let (pid, jid) = (project.to_string(), job.to_string());
        let url = self.endpoint(&["projects", &pid, "jobs", &jid, "retry"])?;
        let resp = self.http.post(url).send().await?;
        ensure_success(resp, "retrying job").await?;
        Ok(())
    }

    async fn resolve_or_create_trigger(&self, project: ProjectId) -> Result<TriggerToken> {
        let triggers = self.list_triggers(project).await?;
        if let Some(existing) = select_trigger(&triggers) {
            debug!(project = %project, trigger_id = existing.id, "reusing pipeline trigger");
            return Ok(TriggerToken(existing.token.clone()));
        }

        let pid = project.to_string();
        let url = self.endpoint(&["projects", &pid, "triggers"])?;
        let resp = self
            .http
            .post(url)
            .form(&[("description", TRIGGER_DESCRIPTION)])
            .send()
            .await?;
        let created: TriggerInfo = ensure_success(resp, "creating trigger").await?.json().await?;
        info!(project = %project, trigger_id = created.id, "created pipeline trigger");
        Ok(TriggerToken(created.token))
    }

    async fn run_pipeline(
        &self,
        project: ProjectId,
        git_ref: &str,
        token: &TriggerToken,
        variables: &BTreeMap<String, String>,
    ) -> Result<()> {
        let pid = project.to_string();
        let url = self.endpoint(&["projects", &pid, "trigger", "pipeline"])?;

        let mut form: Vec<(String, String)> = vec![
            ("token".to_string(), token.0.clone()),
            ("ref".to_string(), git_ref.to_string()),
        ];
        form.extend(
            variables
                .iter()
                .map(|(k, v)| (format!("variables[{k}]"), v.clone())),
        );

        let resp = self.http.post(url).form(&form).send().await?;
        ensure_success(resp, "triggering pipeline").await?;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.http = build_http_client(&self.settings)?;
        info!(url = %self.settings.url, "recreated GitLab HTTP client");
        Ok(())
    }
}

fn build_http_client(settings: &GitLabSettings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    let mut token = HeaderValue::from_str(&settings.token)
        .map_err(|e| SchedError::ConfigError(format!("invalid GitLab token: {e}")))?;
    token.set_sensitive(true);
    headers.insert("PRIVATE-TOKEN", token);

    Client::builder()
        .default_headers(headers)
        .timeout(settings.timeout)
        .user_agent(concat!("gitlab-ci-sched/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(SchedError::from)
}

/// Turn a non-2xx response into [`SchedError::Api`], keeping GitLab's
/// `message` field when there is one.
async fn ensure_success(resp: Response, context: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").map(|m| m.to_string()))
        .unwrap_or(body);

    Err(SchedError::Api {
        status: status.as_u16(),
        message: format!("{context}: {detail}"),
    })
}
