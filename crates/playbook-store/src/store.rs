use async_trait::async_trait;
use playbook_config::{Action, Node, ResolvedScopes};

use crate::error::StoreError;

/// Supplies the nodes of a playbook.
#[async_trait]
pub trait NodeStore: Send + Sync {
  /// Get every node of a playbook, active or not, in stored order.
  async fn get_nodes(&self, playbook_id: &str) -> Result<Vec<Node>, StoreError>;
}

/// Supplies action metadata and the scopes a node's downstream calls may use.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
  /// Get the action a node refers to.
  async fn get_action(&self, action_id: &str) -> Result<Action, StoreError>;

  /// Resolve the authorization scopes granted to an action.
  async fn resolve_scopes(&self, action_id: &str) -> Result<ResolvedScopes, StoreError>;
}
