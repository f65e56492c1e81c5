// src/engine/cache.rs

use std::collections::HashMap;

use tracing::debug;

use crate::ci::{CiServer, ProjectId, TriggerToken};
use crate::errors::Result;

/// Process-lifetime cache of resolved project ids and trigger tokens.
///
/// Entries are written once per key and never evicted or refreshed. If a
/// project is renamed, re-created or its trigger revoked on the server, the
/// daemon must be restarted to pick up the new identifiers.
#[derive(Debug, Default)]
pub struct ProcessCache {
    projects: HashMap<String, ProjectId>,
    triggers: HashMap<ProjectId, TriggerToken>,
}

impl ProcessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project id for `path`, asking the server on first use.
    pub async fn project_id<S>(&mut self, ci: &S, path: &str) -> Result<ProjectId>
    where
        S: CiServer + ?Sized,
    {
        if let Some(id) = self.projects.get(path) {
            return Ok(*id);
        }

        debug!(project = %path, "cache miss: resolving project id");
        let id = ci.resolve_project(path).await?;
        self.projects.insert(path.to_string(), id);
        Ok(id)
    }

    /// Trigger token for `project`, resolving (or creating) it on first use.
    pub async fn trigger_token<S>(&mut self, ci: &S, project: ProjectId) -> Result<TriggerToken>
    where
        S: CiServer + ?Sized,
    {
        if let Some(token) = self.triggers.get(&project) {
            return Ok(token.clone());
        }

        debug!(project = %project, "cache miss: resolving trigger token");
        let token = ci.resolve_or_create_trigger(project).await?;
        self.triggers.insert(project, token.clone());
        Ok(token)
    }

    pub fn cached_project(&self, path: &str) -> Option<ProjectId> {
        self.projects.get(path).copied()
    }

    pub fn has_trigger(&self, project: ProjectId) -> bool {
        self.triggers.contains_key(&project)
    }
}
