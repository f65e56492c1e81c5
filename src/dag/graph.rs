// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::config::model::ConfigFile;
use crate::dag::node::Node;
use crate::errors::{Result, SchedError};

/// Dependency graph of `(project, branch)` nodes.
///
/// Edge direction is `dependency -> dependent`. The graph is built once at
/// startup and is read-only afterwards; the sweep only queries it.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    graph: DiGraph<Node, ()>,
    index: HashMap<Node, NodeIndex>,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a validated [`ConfigFile`].
    ///
    /// Dependencies that are not themselves keys of `[dag]` become nodes too.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut graph = DagGraph::new();

        for (node, deps) in cfg.dag.iter() {
            graph.add_node(node.clone());
            for dep in deps {
                graph.add_edge(dep.clone(), node.clone());
            }
        }

        graph
    }

    /// Insert a node if it is not present yet.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        if let Some(idx) = self.index.get(&node) {
            return *idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }

    /// Record that `dependent` must be built after `dependency`.
    pub fn add_edge(&mut self, dependency: Node, dependent: Node) {
        let from = self.add_node(dependency);
        let to = self.add_node(dependent);
        self.graph.update_edge(from, to, ());
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.index.contains_key(node)
    }

    /// All nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Direct dependencies of `node`.
    pub fn predecessors(&self, node: &Node) -> Vec<&Node> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Direct dependents of `node`.
    pub fn successors(&self, node: &Node) -> Vec<&Node> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Every node reachable from `node` (not including `node` itself).
    pub fn descendants(&self, node: &Node) -> Vec<&Node> {
        let Some(&start) = self.index.get(node) else {
            return Vec::new();
        };

        let mut bfs = Bfs::new(&self.graph, start);
        let mut out = Vec::new();
        while let Some(idx) = bfs.next(&self.graph) {
            if idx != start {
                out.push(&self.graph[idx]);
            }
        }
        out
    }

    /// Nodes sorted so that every dependency comes before its dependents.
    ///
    /// Fails with [`SchedError::DagCycle`] if the graph is not acyclic, which
    /// makes this the acyclicity check as well.
    pub fn topological_order(&self) -> Result<Vec<Node>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect()),
            Err(cycle) => Err(SchedError::DagCycle(format!(
                "cycle detected in project DAG involving '{}'",
                self.graph[cycle.node_id()]
            ))),
        }
    }

    /// Check that the graph is a DAG.
    pub fn validate(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }

    fn neighbors(&self, node: &Node, dir: Direction) -> Vec<&Node> {
        let Some(&idx) = self.index.get(node) else {
            return Vec::new();
        };
        let mut out: Vec<&Node> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| &self.graph[n])
            .collect();
        // petgraph yields neighbours newest-edge first; keep output stable.
        out.sort();
        out
    }
}
