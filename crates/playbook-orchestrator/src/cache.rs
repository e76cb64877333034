//! Per-run caching of action metadata and scopes.
//!
//! Every node referencing the same action shares one resolution, including
//! nodes of the same wave racing to resolve it. Failed resolutions are not
//! cached.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use playbook_config::{Action, ResolvedScopes};
use playbook_store::{ScopeResolver, StoreError};
use tokio::sync::OnceCell;
use tracing::debug;

/// An action together with its resolved scopes.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedAction {
  pub action: Arc<Action>,
  pub scopes: Arc<ResolvedScopes>,
}

type Slot = Arc<OnceCell<ResolvedAction>>;

/// Resolves actions through a [`ScopeResolver`] at most once per action id.
#[derive(Clone)]
pub(crate) struct ScopeCache {
  resolver: Arc<dyn ScopeResolver>,
  slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl ScopeCache {
  pub fn new(resolver: Arc<dyn ScopeResolver>) -> Self {
    Self {
      resolver,
      slots: Arc::new(RwLock::new(HashMap::new())),
    }
  }

  /// Get the action and scopes for `action_id`, resolving them on first use.
  pub async fn get_or_resolve(&self, action_id: &str) -> Result<ResolvedAction, StoreError> {
    let slot = self.slot(action_id);
    slot
      .get_or_try_init(|| async {
        debug!(action_id = %action_id, "resolving action and scopes");
        let action = self.resolver.get_action(action_id).await?;
        let scopes = self.resolver.resolve_scopes(action_id).await?;
        Ok::<_, StoreError>(ResolvedAction {
          action: Arc::new(action),
          scopes: Arc::new(scopes),
        })
      })
      .await
      .cloned()
  }

  fn slot(&self, action_id: &str) -> Slot {
    {
      let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
      if let Some(slot) = slots.get(action_id) {
        return slot.clone();
      }
    }

    let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
    slots.entry(action_id.to_string()).or_default().clone()
  }
}
