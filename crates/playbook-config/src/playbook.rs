use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ResolvedScopes};
use crate::node::Node;

/// A complete playbook definition as stored on disk or in a database blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookDef {
  pub playbook_id: String,
  pub name: String,
  #[serde(default)]
  pub nodes: Vec<Node>,
  #[serde(default)]
  pub actions: Vec<Action>,
  /// Resolved scopes keyed by action id. Missing entries mean "no scopes".
  #[serde(default)]
  pub scopes: HashMap<String, ResolvedScopes>,
}

impl PlaybookDef {
  pub fn get_action(&self, action_id: &str) -> Option<&Action> {
    self.actions.iter().find(|a| a.action_id == action_id)
  }
}
