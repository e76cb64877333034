//! Run-level error types.
//!
//! Node failures never appear here; they are reported as `NodeFailed` and
//! `RunFailed` events. These errors end a run's stream instead of a terminal
//! event.

use playbook_graph::GraphError;
use playbook_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// The run's cancellation token fired.
  #[error("run cancelled")]
  Cancelled,

  /// The node list could not be loaded.
  #[error("failed to load nodes for playbook '{playbook_id}': {source}")]
  NodeStore {
    playbook_id: String,
    #[source]
    source: StoreError,
  },

  /// Action metadata or scopes could not be resolved for a node.
  #[error("failed to resolve action '{action_id}' for node '{node_id}': {source}")]
  ScopeResolution {
    node_id: String,
    action_id: String,
    #[source]
    source: StoreError,
  },

  /// The playbook's dependency graph is malformed.
  #[error("invalid playbook '{playbook_id}': {source}")]
  InvalidPlaybook {
    playbook_id: String,
    #[source]
    source: GraphError,
  },

  #[error("invalid configuration: {message}")]
  InvalidConfig { message: String },

  /// The consumer dropped the event stream.
  #[error("event stream closed")]
  StreamClosed,
}
