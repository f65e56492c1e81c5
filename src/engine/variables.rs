// src/engine/variables.rs

//! Variables passed to triggered pipelines.
//!
//! For every direct dependency `(project, branch)` of the triggered node the
//! pipeline receives `REF_<PROJECT>=<branch>`, so the downstream
//! `.gitlab-ci.yml` can fetch artifacts built from the matching upstream ref.
//! Both the key and the value are normalised and must stay byte-for-byte
//! stable.

use std::collections::BTreeMap;

use tracing::warn;

use crate::dag::{DagGraph, Node};

/// `group/my-api` -> `REF_GROUP_MY_API`.
pub fn ref_variable_name(project: &str) -> String {
    let normalised: String = project
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("REF_{normalised}")
}

/// `Feature/X-1` -> `feature-x-1`.
pub fn ref_variable_value(branch: &str) -> String {
    branch
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Variables for triggering `node`: the `fixed` ones, overlaid with one
/// `REF_*` entry per direct dependency.
pub fn derive_variables(
    graph: &DagGraph,
    node: &Node,
    fixed: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut vars = fixed;

    for pred in graph.predecessors(node) {
        let key = ref_variable_name(&pred.project);
        let value = ref_variable_value(&pred.branch);
        if let Some(previous) = vars.insert(key.clone(), value.clone()) {
            if previous != value {
                warn!(
                    node = %node,
                    variable = %key,
                    %previous,
                    %value,
                    "trigger variable overwritten by dependency ref"
                );
            }
        }
    }

    vars
}
