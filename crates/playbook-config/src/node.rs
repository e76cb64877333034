use serde::{Deserialize, Serialize};

/// One unit of work in a playbook.
///
/// Nodes are loaded once per run and never mutated while it executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
  pub node_id: String,
  pub playbook_id: String,
  pub action_id: String,
  pub name: String,
  /// Key under which this node's output is published to downstream nodes.
  #[serde(default)]
  pub output_variable: String,
  /// Ordering hint used to sort nodes inside a wave.
  #[serde(default)]
  pub execution_order: i32,
  #[serde(default)]
  pub depends_on: Vec<String>,
  /// Opaque, action-specific configuration.
  #[serde(default)]
  pub config: serde_json::Value,
  #[serde(default = "default_active")]
  pub is_active: bool,
}

fn default_active() -> bool {
  true
}

impl Node {
  /// The key this node writes into the run's output-variable map.
  ///
  /// Falls back to the node id when no output variable was configured.
  pub fn output_key(&self) -> &str {
    if self.output_variable.trim().is_empty() {
      &self.node_id
    } else {
      &self.output_variable
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_defaults() {
    let node: Node = serde_json::from_value(json!({
      "nodeId": "n1",
      "playbookId": "pb",
      "actionId": "a1",
      "name": "First"
    }))
    .unwrap();

    assert!(node.is_active);
    assert!(node.depends_on.is_empty());
    assert_eq!(node.execution_order, 0);
    assert_eq!(node.config, serde_json::Value::Null);
  }

  #[test]
  fn test_output_key_falls_back_to_node_id() {
    let mut node: Node = serde_json::from_value(json!({
      "nodeId": "n1",
      "playbookId": "pb",
      "actionId": "a1",
      "name": "First",
      "outputVariable": "  "
    }))
    .unwrap();
    assert_eq!(node.output_key(), "n1");

    node.output_variable = "summary".to_string();
    assert_eq!(node.output_key(), "summary");
  }
}
