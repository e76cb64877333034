//! Node execution results.

use playbook_config::Node;
use serde::{Deserialize, Serialize};

/// Result of executing one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutput {
  pub node_id: String,
  pub output_variable: String,
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl NodeOutput {
  /// A successful output for `node`.
  pub fn ok(node: &Node, payload: serde_json::Value) -> Self {
    Self {
      node_id: node.node_id.clone(),
      output_variable: node.output_key().to_string(),
      success: true,
      payload: Some(payload),
      error: None,
    }
  }

  /// A failed output for `node`.
  pub fn failed(node: &Node, error: impl Into<String>) -> Self {
    Self {
      node_id: node.node_id.clone(),
      output_variable: node.output_key().to_string(),
      success: false,
      payload: None,
      error: Some(error.into()),
    }
  }

  /// Error text, or an empty string for successful outputs.
  pub fn error_message(&self) -> &str {
    self.error.as_deref().unwrap_or_default()
  }
}

/// Outcome of an executor's pre-flight configuration check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
  pub valid: bool,
  pub errors: Vec<String>,
}

impl ValidationResult {
  pub fn ok() -> Self {
    Self {
      valid: true,
      errors: Vec::new(),
    }
  }

  /// Valid when `errors` is empty.
  pub fn from_errors(errors: Vec<String>) -> Self {
    Self {
      valid: errors.is_empty(),
      errors,
    }
  }

  pub fn invalid(error: impl Into<String>) -> Self {
    Self::from_errors(vec![error.into()])
  }

  /// All errors joined into one message.
  pub fn message(&self) -> String {
    self.errors.join("; ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validation_from_errors() {
    assert!(ValidationResult::from_errors(vec![]).valid);

    let result = ValidationResult::from_errors(vec![
      "subject is required".to_string(),
      "at least one recipient is required".to_string(),
    ]);
    assert!(!result.valid);
    assert_eq!(
      result.message(),
      "subject is required; at least one recipient is required"
    );
  }
}
