//! Error types for executors and the registry.

use playbook_config::ActionType;
use thiserror::Error;

/// Errors raised while resolving an executor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  /// No executor handles this action type.
  #[error("no executor registered for action type '{0}'")]
  MissingExecutor(ActionType),

  /// Two executors claimed the same action type.
  #[error("more than one executor registered for action type '{0}'")]
  DuplicateExecutor(ActionType),
}

/// Unexpected failures and cancellation from [`NodeExecutor::execute`].
///
/// Expected failures are reported as a failed [`NodeOutput`] instead.
///
/// [`NodeExecutor::execute`]: crate::NodeExecutor::execute
/// [`NodeOutput`]: crate::NodeOutput
#[derive(Debug, Error)]
pub enum ExecutorError {
  /// The executor observed the run's cancellation token.
  #[error("execution cancelled")]
  Cancelled,

  /// Infrastructure failure inside the executor.
  #[error("{message}")]
  Internal { message: String },

  #[error(transparent)]
  Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ExecutorError {
  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }
}

/// A second write to an output variable key.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("output variable '{0}' was already written")]
pub struct OutputConflict(pub String);
