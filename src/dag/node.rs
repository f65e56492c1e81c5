// src/dag/node.rs

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::SchedError;

/// `group/project/branch`: the first two segments name the project, the rest
/// (which may itself contain slashes) is the branch.
static NODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^/]+/[^/]+)/(.+)$").expect("static regex"));

/// A `(project, branch)` pair tracked by the DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node {
    /// Full project path, e.g. `group/api`.
    pub project: String,
    /// Branch (or ref) within the project.
    pub branch: String,
}

impl Node {
    pub fn new(project: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.branch)
    }
}

impl FromStr for Node {
    type Err = SchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = NODE_REGEX.captures(s.trim()).ok_or_else(|| {
            SchedError::MalformedNode(format!(
                "'{s}' (expected \"group/project/branch\")"
            ))
        })?;
        Ok(Node::new(&caps[1], &caps[2]))
    }
}
