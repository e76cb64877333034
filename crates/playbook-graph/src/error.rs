use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("node '{node_id}' depends on unknown node '{dependency}'")]
  UnknownDependency { node_id: String, dependency: String },

  #[error("output variable '{key}' is written by both '{first}' and '{second}'")]
  DuplicateOutputVariable {
    key: String,
    first: String,
    second: String,
  },

  #[error("dependency cycle detected among nodes: {}", nodes.join(", "))]
  Cycle { nodes: Vec<String> },
}
