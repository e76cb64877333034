use std::collections::HashMap;

use async_trait::async_trait;
use playbook_config::{Action, Node, PlaybookDef, ResolvedScopes};

use crate::error::StoreError;
use crate::store::{NodeStore, ScopeResolver};

/// An in-memory store holding fully defined playbooks.
///
/// Actions are looked up across all registered playbooks, so action ids are
/// expected to be globally unique.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  playbooks: HashMap<String, PlaybookDef>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a playbook, replacing any previous one with the same id.
  pub fn with_playbook(mut self, playbook: PlaybookDef) -> Self {
    self.insert(playbook);
    self
  }

  pub fn insert(&mut self, playbook: PlaybookDef) {
    self
      .playbooks
      .insert(playbook.playbook_id.clone(), playbook);
  }

  fn find_action(&self, action_id: &str) -> Option<(&PlaybookDef, &Action)> {
    self
      .playbooks
      .values()
      .find_map(|pb| pb.get_action(action_id).map(|a| (pb, a)))
  }
}

#[async_trait]
impl NodeStore for MemoryStore {
  async fn get_nodes(&self, playbook_id: &str) -> Result<Vec<Node>, StoreError> {
    self
      .playbooks
      .get(playbook_id)
      .map(|pb| pb.nodes.clone())
      .ok_or_else(|| StoreError::PlaybookNotFound(playbook_id.to_string()))
  }
}

#[async_trait]
impl ScopeResolver for MemoryStore {
  async fn get_action(&self, action_id: &str) -> Result<Action, StoreError> {
    self
      .find_action(action_id)
      .map(|(_, action)| action.clone())
      .ok_or_else(|| StoreError::ActionNotFound(action_id.to_string()))
  }

  async fn resolve_scopes(&self, action_id: &str) -> Result<ResolvedScopes, StoreError> {
    let (playbook, _) = self
      .find_action(action_id)
      .ok_or_else(|| StoreError::ActionNotFound(action_id.to_string()))?;
    Ok(playbook.scopes.get(action_id).cloned().unwrap_or_default())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::{BTreeSet, HashMap};

  use playbook_config::ActionType;

  use super::*;

  fn playbook() -> PlaybookDef {
    PlaybookDef {
      playbook_id: "pb-1".to_string(),
      name: "Intake".to_string(),
      nodes: vec![Node {
        node_id: "n1".to_string(),
        playbook_id: "pb-1".to_string(),
        action_id: "email".to_string(),
        name: "Notify".to_string(),
        output_variable: "notified".to_string(),
        execution_order: 1,
        depends_on: vec![],
        config: serde_json::json!({}),
        is_active: true,
      }],
      actions: vec![Action {
        action_id: "email".to_string(),
        name: "Send email".to_string(),
        action_type: ActionType::SendEmail,
      }],
      scopes: HashMap::from([(
        "email".to_string(),
        ResolvedScopes {
          operations: BTreeSet::from(["send".to_string()]),
          ..Default::default()
        },
      )]),
    }
  }

  #[tokio::test]
  async fn test_get_nodes() {
    let store = MemoryStore::new().with_playbook(playbook());

    let nodes = store.get_nodes("pb-1").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].node_id, "n1");

    let missing = store.get_nodes("pb-2").await;
    assert!(matches!(missing, Err(StoreError::PlaybookNotFound(id)) if id == "pb-2"));
  }

  #[tokio::test]
  async fn test_action_and_scopes() {
    let store = MemoryStore::new().with_playbook(playbook());

    let action = store.get_action("email").await.unwrap();
    assert_eq!(action.action_type, ActionType::SendEmail);

    let scopes = store.resolve_scopes("email").await.unwrap();
    assert!(scopes.allows_operation("send"));

    assert!(matches!(
      store.get_action("nope").await,
      Err(StoreError::ActionNotFound(_))
    ));
  }
}
