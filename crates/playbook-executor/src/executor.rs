use async_trait::async_trait;
use playbook_config::ActionType;
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::output::{NodeOutput, ValidationResult};

/// Performs the work of one or more action types.
///
/// Implementations report expected failures as a failed [`NodeOutput`] and
/// reserve `Err` for infrastructure problems and cancellation.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
  /// Action types this executor handles.
  fn action_types(&self) -> Vec<ActionType>;

  /// Check the node's configuration. Must not perform I/O.
  fn validate(&self, ctx: &ExecutionContext) -> ValidationResult;

  /// Perform the node's work, honoring `cancel`.
  async fn execute(
    &self,
    ctx: &ExecutionContext,
    cancel: CancellationToken,
  ) -> Result<NodeOutput, ExecutorError>;
}
