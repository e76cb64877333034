//! Playbook Graph
//!
//! Builds the dependency graph of a playbook's active nodes and partitions it
//! into waves: sets of nodes whose dependencies have all completed.
//!
//! Key guarantees:
//! - Node ids are unique and every dependency references a known node
//! - Output-variable keys are unique, so concurrent writers never collide
//! - [`DependencyGraph::validate_acyclic`] rejects self and transitive cycles
//! - Waves are ordered by execution-order hint, then node id

mod error;
mod graph;

pub use error::GraphError;
pub use graph::DependencyGraph;
