use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of work a node performs. Executors are registered per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
  AiAnalysis,
  CreateTask,
  SendEmail,
  UpdateRecord,
  DeliverOutput,
}

impl ActionType {
  /// All built-in action types, in declaration order.
  pub const ALL: [ActionType; 5] = [
    ActionType::AiAnalysis,
    ActionType::CreateTask,
    ActionType::SendEmail,
    ActionType::UpdateRecord,
    ActionType::DeliverOutput,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ActionType::AiAnalysis => "ai-analysis",
      ActionType::CreateTask => "create-task",
      ActionType::SendEmail => "send-email",
      ActionType::UpdateRecord => "update-record",
      ActionType::DeliverOutput => "deliver-output",
    }
  }
}

impl fmt::Display for ActionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Metadata describing what a node does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
  pub action_id: String,
  pub name: String,
  pub action_type: ActionType,
}

/// Authorization context for a node's downstream calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedScopes {
  #[serde(default)]
  pub entities: BTreeSet<String>,
  #[serde(default)]
  pub fields: BTreeSet<String>,
  #[serde(default)]
  pub operations: BTreeSet<String>,
}

impl ResolvedScopes {
  pub fn allows_entity(&self, entity: &str) -> bool {
    self.entities.contains(entity)
  }

  pub fn allows_field(&self, field: &str) -> bool {
    self.fields.contains(field)
  }

  pub fn allows_operation(&self, operation: &str) -> bool {
    self.operations.contains(operation)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_action_type_wire_names() {
    for action_type in ActionType::ALL {
      let json = serde_json::to_value(action_type).unwrap();
      assert_eq!(json, serde_json::Value::String(action_type.as_str().to_string()));
    }
  }

  #[test]
  fn test_unknown_action_type_is_rejected() {
    let result: Result<ActionType, _> = serde_json::from_str("\"launch-rocket\"");
    assert!(result.is_err());
  }

  #[test]
  fn test_scope_lookups() {
    let scopes = ResolvedScopes {
      entities: BTreeSet::from(["account".to_string()]),
      fields: BTreeSet::from(["name".to_string()]),
      operations: BTreeSet::from(["read".to_string()]),
    };

    assert!(scopes.allows_entity("account"));
    assert!(!scopes.allows_entity("contact"));
    assert!(scopes.allows_field("name"));
    assert!(scopes.allows_operation("read"));
    assert!(!scopes.allows_operation("delete"));
  }
}
