use std::path::{Path, PathBuf};

use async_trait::async_trait;
use playbook_config::{Action, Node, PlaybookDef, ResolvedScopes};
use tokio::fs;

use crate::error::StoreError;
use crate::store::{NodeStore, ScopeResolver};

/// Filesystem-based playbook store.
///
/// Playbooks are stored one per file:
/// ```text
/// {root}/
/// ├── intake-review.json
/// └── contract-renewal.json
/// ```
/// Each file holds a [`PlaybookDef`] and its name (minus `.json`) is the
/// playbook id.
pub struct FsPlaybookStore {
  root: PathBuf,
}

impl FsPlaybookStore {
  /// Create a new filesystem store at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the store.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Load a single playbook definition.
  pub async fn load(&self, playbook_id: &str) -> Result<PlaybookDef, StoreError> {
    let path = self.playbook_path(playbook_id)?;
    if !path.exists() {
      return Err(StoreError::PlaybookNotFound(playbook_id.to_string()));
    }
    Self::read_playbook(&path).await
  }

  /// List every playbook in the store.
  pub async fn list(&self) -> Result<Vec<PlaybookDef>, StoreError> {
    let mut playbooks = Vec::new();

    if !self.root.exists() {
      return Ok(playbooks);
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        playbooks.push(Self::read_playbook(&path).await?);
      }
    }

    playbooks.sort_by(|a, b| a.playbook_id.cmp(&b.playbook_id));
    Ok(playbooks)
  }

  /// Write a playbook definition, replacing any existing file.
  pub async fn save(&self, playbook: &PlaybookDef) -> Result<(), StoreError> {
    let path = self.playbook_path(&playbook.playbook_id)?;
    fs::create_dir_all(&self.root).await?;
    let content = serde_json::to_string_pretty(playbook)?;
    fs::write(&path, content).await?;
    Ok(())
  }

  /// Map a playbook id to its file, rejecting ids that would escape the root.
  fn playbook_path(&self, playbook_id: &str) -> Result<PathBuf, StoreError> {
    if playbook_id.is_empty()
      || playbook_id.contains(['/', '\\'])
      || playbook_id.starts_with('.')
    {
      return Err(StoreError::InvalidId(playbook_id.to_string()));
    }
    Ok(self.root.join(format!("{}.json", playbook_id)))
  }

  async fn read_playbook(path: &Path) -> Result<PlaybookDef, StoreError> {
    let content = fs::read_to_string(path).await?;
    let playbook: PlaybookDef = serde_json::from_str(&content)?;
    Ok(playbook)
  }

  async fn find_action(&self, action_id: &str) -> Result<(PlaybookDef, Action), StoreError> {
    for playbook in self.list().await? {
      if let Some(action) = playbook.get_action(action_id).cloned() {
        return Ok((playbook, action));
      }
    }
    Err(StoreError::ActionNotFound(action_id.to_string()))
  }
}

#[async_trait]
impl NodeStore for FsPlaybookStore {
  async fn get_nodes(&self, playbook_id: &str) -> Result<Vec<Node>, StoreError> {
    Ok(self.load(playbook_id).await?.nodes)
  }
}

#[async_trait]
impl ScopeResolver for FsPlaybookStore {
  async fn get_action(&self, action_id: &str) -> Result<Action, StoreError> {
    self.find_action(action_id).await.map(|(_, action)| action)
  }

  async fn resolve_scopes(&self, action_id: &str) -> Result<ResolvedScopes, StoreError> {
    let (mut playbook, _) = self.find_action(action_id).await?;
    Ok(playbook.scopes.remove(action_id).unwrap_or_default())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use playbook_config::ActionType;
  use serde_json::json;

  use super::*;

  fn sample_playbook() -> PlaybookDef {
    serde_json::from_value(json!({
      "playbookId": "intake",
      "name": "Intake review",
      "nodes": [
        {
          "nodeId": "analyze",
          "playbookId": "intake",
          "actionId": "ai",
          "name": "Analyze document",
          "outputVariable": "analysis",
          "executionOrder": 1
        },
        {
          "nodeId": "notify",
          "playbookId": "intake",
          "actionId": "mail",
          "name": "Notify owner",
          "outputVariable": "notified",
          "executionOrder": 2,
          "dependsOn": ["analyze"],
          "config": { "to": ["owner@example.com"], "subject": "Done" }
        }
      ],
      "actions": [
        { "actionId": "ai", "name": "Analyze", "actionType": "ai-analysis" },
        { "actionId": "mail", "name": "Mail", "actionType": "send-email" }
      ],
      "scopes": {
        "mail": { "operations": ["send"] }
      }
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn test_save_and_load_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FsPlaybookStore::new(temp_dir.path());

    store.save(&sample_playbook()).await.unwrap();

    let nodes = store.get_nodes("intake").await.unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[1].depends_on, vec!["analyze".to_string()]);

    let action = store.get_action("mail").await.unwrap();
    assert_eq!(action.action_type, ActionType::SendEmail);

    let scopes = store.resolve_scopes("mail").await.unwrap();
    assert!(scopes.allows_operation("send"));

    // No scope entry means empty scopes, not an error
    let scopes = store.resolve_scopes("ai").await.unwrap();
    assert_eq!(scopes, ResolvedScopes::default());
  }

  #[tokio::test]
  async fn test_missing_playbook() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FsPlaybookStore::new(temp_dir.path());

    let result = store.get_nodes("absent").await;
    assert!(matches!(result, Err(StoreError::PlaybookNotFound(id)) if id == "absent"));
  }

  #[tokio::test]
  async fn test_rejects_path_traversal() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FsPlaybookStore::new(temp_dir.path());

    assert!(matches!(
      store.get_nodes("../etc/passwd").await,
      Err(StoreError::InvalidId(_))
    ));
  }

  #[tokio::test]
  async fn test_list_skips_non_json_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FsPlaybookStore::new(temp_dir.path());
    store.save(&sample_playbook()).await.unwrap();
    std::fs::write(temp_dir.path().join("README.md"), "notes").unwrap();

    let playbooks = store.list().await.unwrap();
    assert_eq!(playbooks.len(), 1);
    assert_eq!(playbooks[0].scopes, HashMap::from([(
      "mail".to_string(),
      ResolvedScopes {
        operations: ["send".to_string()].into_iter().collect(),
        ..Default::default()
      }
    )]));
  }

  #[tokio::test]
  async fn test_list_missing_root_is_empty() {
    let store = FsPlaybookStore::new("/definitely/not/here");
    assert!(store.list().await.unwrap().is_empty());
  }
}
