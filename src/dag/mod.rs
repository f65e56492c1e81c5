// src/dag/mod.rs

//! Project DAG and per-sweep locking.
//!
//! - [`node`] defines the `(project, branch)` node type.
//! - [`graph`] holds the dependency graph (petgraph-backed) and answers the
//!   ordering / neighbourhood queries the sweep needs.
//! - [`lock`] tracks which nodes must not be built for the rest of a sweep.

pub mod graph;
pub mod lock;
pub mod node;

pub use graph::DagGraph;
pub use lock::LockSet;
pub use node::Node;
