//! Dispatch table from action type to executor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use playbook_config::ActionType;
use tracing::debug;

use crate::error::RegistryError;
use crate::executor::NodeExecutor;

/// Maps each action type to the executor that handles it.
///
/// Built once at startup from a fixed set of executors. Performs no I/O.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
  executors: HashMap<ActionType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
  /// Build a registry. Fails if two executors claim the same action type.
  pub fn new(
    executors: impl IntoIterator<Item = Arc<dyn NodeExecutor>>,
  ) -> Result<Self, RegistryError> {
    let mut map: HashMap<ActionType, Arc<dyn NodeExecutor>> = HashMap::new();

    for executor in executors {
      for action_type in executor.action_types() {
        if map.contains_key(&action_type) {
          return Err(RegistryError::DuplicateExecutor(action_type));
        }
        debug!(action_type = %action_type, "registered executor");
        map.insert(action_type, executor.clone());
      }
    }

    Ok(Self { executors: map })
  }

  /// Resolve the executor for an action type.
  pub fn get(&self, action_type: ActionType) -> Result<Arc<dyn NodeExecutor>, RegistryError> {
    self
      .executors
      .get(&action_type)
      .cloned()
      .ok_or(RegistryError::MissingExecutor(action_type))
  }

  pub fn has_executor(&self, action_type: ActionType) -> bool {
    self.executors.contains_key(&action_type)
  }

  /// Action types with a registered executor, sorted.
  pub fn supported_action_types(&self) -> Vec<ActionType> {
    let mut types: Vec<ActionType> = self.executors.keys().copied().collect();
    types.sort();
    types
  }
}

impl fmt::Debug for ExecutorRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutorRegistry")
      .field("action_types", &self.supported_action_types())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use tokio_util::sync::CancellationToken;

  use super::*;
  use crate::context::ExecutionContext;
  use crate::error::ExecutorError;
  use crate::output::{NodeOutput, ValidationResult};

  struct Fixed(Vec<ActionType>);

  #[async_trait]
  impl NodeExecutor for Fixed {
    fn action_types(&self) -> Vec<ActionType> {
      self.0.clone()
    }

    fn validate(&self, _ctx: &ExecutionContext) -> ValidationResult {
      ValidationResult::ok()
    }

    async fn execute(
      &self,
      ctx: &ExecutionContext,
      _cancel: CancellationToken,
    ) -> Result<NodeOutput, ExecutorError> {
      Ok(NodeOutput::ok(&ctx.node, serde_json::Value::Null))
    }
  }

  #[test]
  fn test_get_registered_executor() {
    let registry = ExecutorRegistry::new([
      Arc::new(Fixed(vec![ActionType::SendEmail])) as Arc<dyn NodeExecutor>,
      Arc::new(Fixed(vec![ActionType::CreateTask, ActionType::AiAnalysis])),
    ])
    .unwrap();

    assert!(registry.get(ActionType::SendEmail).is_ok());
    assert!(registry.has_executor(ActionType::AiAnalysis));
    assert_eq!(
      registry.supported_action_types(),
      vec![
        ActionType::AiAnalysis,
        ActionType::CreateTask,
        ActionType::SendEmail
      ]
    );
  }

  #[test]
  fn test_missing_executor() {
    let registry = ExecutorRegistry::new([
      Arc::new(Fixed(vec![ActionType::SendEmail])) as Arc<dyn NodeExecutor>,
    ])
    .unwrap();

    assert!(!registry.has_executor(ActionType::DeliverOutput));
    assert_eq!(
      registry.get(ActionType::DeliverOutput).err(),
      Some(RegistryError::MissingExecutor(ActionType::DeliverOutput))
    );
  }

  #[test]
  fn test_duplicate_executor_rejected() {
    let result = ExecutorRegistry::new([
      Arc::new(Fixed(vec![ActionType::SendEmail])) as Arc<dyn NodeExecutor>,
      Arc::new(Fixed(vec![ActionType::SendEmail])),
    ]);

    assert_eq!(
      result.err(),
      Some(RegistryError::DuplicateExecutor(ActionType::SendEmail))
    );
  }
}
