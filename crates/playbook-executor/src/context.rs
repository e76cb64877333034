//! Per-node execution context and the run's shared output map.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use playbook_config::{Action, ActionType, Node, ResolvedScopes};

use crate::error::OutputConflict;
use crate::output::NodeOutput;

/// The run's output-variable map.
///
/// Append-only: each key is written exactly once. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct OutputVariables {
  inner: Arc<RwLock<HashMap<String, NodeOutput>>>,
}

impl OutputVariables {
  pub fn new() -> Self {
    Self::default()
  }

  /// Publish a node's output under `key`.
  pub fn insert(&self, key: &str, output: NodeOutput) -> Result<(), OutputConflict> {
    let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
    if map.contains_key(key) {
      return Err(OutputConflict(key.to_string()));
    }
    map.insert(key.to_string(), output);
    Ok(())
  }

  /// A read-only handle onto the same map.
  pub fn view(&self) -> OutputView {
    OutputView {
      inner: self.inner.clone(),
    }
  }

  pub fn len(&self) -> usize {
    self.view().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn snapshot(&self) -> HashMap<String, NodeOutput> {
    self.view().snapshot()
  }
}

/// Read access to the run's output variables.
#[derive(Debug, Clone)]
pub struct OutputView {
  inner: Arc<RwLock<HashMap<String, NodeOutput>>>,
}

impl OutputView {
  pub fn get(&self, key: &str) -> Option<NodeOutput> {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  pub fn contains(&self, key: &str) -> bool {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Copy of every output published so far.
  pub fn snapshot(&self) -> HashMap<String, NodeOutput> {
    self
      .inner
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

/// Everything a [`NodeExecutor`](crate::NodeExecutor) needs to run one node.
///
/// Built fresh for each node invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
  pub run_id: String,
  pub playbook_id: String,
  pub node: Arc<Node>,
  pub action: Arc<Action>,
  pub action_type: ActionType,
  pub scopes: Arc<ResolvedScopes>,
  pub tenant_id: String,
  pub document_ids: Arc<[String]>,
  /// Live view of published outputs: every earlier wave, plus same-wave
  /// siblings that have already finished.
  pub outputs: OutputView,
}

impl ExecutionContext {
  pub fn node_id(&self) -> &str {
    &self.node.node_id
  }

  /// The node's opaque configuration.
  pub fn config(&self) -> &serde_json::Value {
    &self.node.config
  }

  /// Output of another node, by its output-variable key.
  pub fn input(&self, key: &str) -> Option<NodeOutput> {
    self.outputs.get(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn output(node_id: &str) -> NodeOutput {
    NodeOutput {
      node_id: node_id.to_string(),
      output_variable: format!("{}_out", node_id),
      success: true,
      payload: Some(serde_json::json!({ "ok": true })),
      error: None,
    }
  }

  #[test]
  fn test_insert_once() {
    let outputs = OutputVariables::new();
    outputs.insert("a_out", output("a")).unwrap();

    let err = outputs.insert("a_out", output("b")).unwrap_err();
    assert_eq!(err, OutputConflict("a_out".to_string()));
    assert_eq!(outputs.view().get("a_out").unwrap().node_id, "a");
  }

  #[test]
  fn test_view_sees_later_writes() {
    let outputs = OutputVariables::new();
    let view = outputs.view();
    assert!(view.is_empty());

    outputs.insert("a_out", output("a")).unwrap();
    assert!(view.contains("a_out"));
    assert_eq!(view.len(), 1);
    assert_eq!(outputs.snapshot().len(), 1);
  }

  #[test]
  fn test_concurrent_inserts_of_disjoint_keys() {
    let outputs = OutputVariables::new();

    let handles: Vec<_> = (0..8)
      .map(|i| {
        let outputs = outputs.clone();
        std::thread::spawn(move || {
          outputs
            .insert(&format!("n{}_out", i), output(&format!("n{}", i)))
            .unwrap();
        })
      })
      .collect();
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(outputs.len(), 8);
  }
}
