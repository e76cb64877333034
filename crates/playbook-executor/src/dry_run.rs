//! Executors for the built-in action types that validate configuration and
//! echo it back instead of calling any downstream system.

use std::sync::Arc;

use async_trait::async_trait;
use playbook_config::ActionType;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::NodeExecutor;
use crate::output::{NodeOutput, ValidationResult};

/// A side-effect free executor for one built-in action type.
#[derive(Debug, Clone, Copy)]
pub struct DryRunExecutor {
  action_type: ActionType,
}

impl DryRunExecutor {
  pub fn new(action_type: ActionType) -> Self {
    Self { action_type }
  }

  /// One dry-run executor per built-in action type.
  pub fn all() -> Vec<Arc<dyn NodeExecutor>> {
    ActionType::ALL
      .into_iter()
      .map(|t| Arc::new(Self::new(t)) as Arc<dyn NodeExecutor>)
      .collect()
  }
}

#[async_trait]
impl NodeExecutor for DryRunExecutor {
  fn action_types(&self) -> Vec<ActionType> {
    vec![self.action_type]
  }

  fn validate(&self, ctx: &ExecutionContext) -> ValidationResult {
    ValidationResult::from_errors(validate_config(self.action_type, ctx.config()))
  }

  async fn execute(
    &self,
    ctx: &ExecutionContext,
    cancel: CancellationToken,
  ) -> Result<NodeOutput, ExecutorError> {
    if cancel.is_cancelled() {
      return Err(ExecutorError::Cancelled);
    }

    debug!(node_id = %ctx.node_id(), action_type = %self.action_type, "dry run");

    let mut inputs: Vec<String> = ctx.outputs.snapshot().into_keys().collect();
    inputs.sort();

    Ok(NodeOutput::ok(
      &ctx.node,
      json!({
        "dryRun": true,
        "actionType": self.action_type,
        "tenantId": ctx.tenant_id,
        "documentIds": ctx.document_ids.as_ref(),
        "inputs": inputs,
        "config": ctx.config(),
      }),
    ))
  }
}

/// Configuration rules for each built-in action type.
fn validate_config(action_type: ActionType, config: &Value) -> Vec<String> {
  let mut errors = Vec::new();

  if !config.is_object() {
    errors.push("configuration must be a JSON object".to_string());
    return errors;
  }

  match action_type {
    ActionType::AiAnalysis => {}
    ActionType::SendEmail => {
      if !has_recipient(config.get("to")) {
        errors.push("at least one recipient is required".to_string());
      }
      require_string(config, "subject", &mut errors);
    }
    ActionType::CreateTask => require_string(config, "subject", &mut errors),
    ActionType::UpdateRecord => require_string(config, "entityName", &mut errors),
    ActionType::DeliverOutput => require_string(config, "deliveryType", &mut errors),
  }

  errors
}

fn require_string(config: &Value, key: &str, errors: &mut Vec<String>) {
  let present = config
    .get(key)
    .and_then(Value::as_str)
    .is_some_and(|s| !s.trim().is_empty());
  if !present {
    errors.push(format!("'{}' is required", key));
  }
}

/// `to` may be a single address or a list of addresses.
fn has_recipient(to: Option<&Value>) -> bool {
  match to {
    Some(Value::String(s)) => !s.trim().is_empty(),
    Some(Value::Array(items)) => items
      .iter()
      .any(|v| v.as_str().is_some_and(|s| !s.trim().is_empty())),
    _ => false,
  }
}
