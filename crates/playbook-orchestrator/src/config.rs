//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Default number of nodes allowed to execute at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
  /// Maximum nodes executing concurrently within one run.
  pub max_concurrency: usize,
  /// Tenant placed in every execution context unless the request overrides it.
  pub tenant_id: String,
  /// Capacity of the event channel behind each `RunStream`.
  pub event_buffer: usize,
  /// Reject cyclic dependency graphs before the first wave.
  pub validate_graph: bool,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      max_concurrency: DEFAULT_MAX_CONCURRENCY,
      tenant_id: "default".to_string(),
      event_buffer: 64,
      validate_graph: true,
    }
  }
}

impl OrchestratorConfig {
  pub fn validate(&self) -> Result<(), OrchestratorError> {
    if self.max_concurrency == 0 {
      return Err(OrchestratorError::InvalidConfig {
        message: "max_concurrency must be at least 1".to_string(),
      });
    }
    if self.event_buffer == 0 {
      return Err(OrchestratorError::InvalidConfig {
        message: "event_buffer must be at least 1".to_string(),
      });
    }
    Ok(())
  }
}
