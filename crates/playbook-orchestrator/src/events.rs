//! Run events, metrics and lifecycle state.
//!
//! Events are emitted in causal order: `RunStarted` first, `NodeStarted`
//! before the same node's `NodeCompleted`/`NodeFailed`, and a terminal
//! `RunCompleted`/`RunFailed` last.

use std::fmt;

use playbook_config::Node;
use playbook_executor::NodeOutput;
use serde::{Deserialize, Serialize};

/// Identifies the node an event describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
  pub node_id: String,
  pub name: String,
  pub output_variable: String,
}

impl From<&Node> for NodeRef {
  fn from(node: &Node) -> Self {
    Self {
      node_id: node.node_id.clone(),
      name: node.name.clone(),
      output_variable: node.output_key().to_string(),
    }
  }
}

/// Aggregate node counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
  pub total_nodes: usize,
  pub completed_nodes: usize,
  pub failed_nodes: usize,
}

/// Events emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
  /// The run has started. Always the first event.
  RunStarted { run_id: String, playbook_id: String },

  /// A node passed the throttle and is about to validate and execute.
  NodeStarted { run_id: String, node: NodeRef },

  /// A node executed successfully.
  NodeCompleted {
    run_id: String,
    node: NodeRef,
    output: NodeOutput,
  },

  /// A node failed validation, had no executor, or failed to execute.
  NodeFailed {
    run_id: String,
    node: NodeRef,
    error: String,
  },

  /// A completed node is a prerequisite of the next wave.
  StageComplete { run_id: String, node: NodeRef },

  /// Every node completed. Terminal.
  RunCompleted { run_id: String, metrics: RunMetrics },

  /// A node failed and no further waves were started. Terminal.
  RunFailed {
    run_id: String,
    error: String,
    metrics: RunMetrics,
  },
}

/// Discriminant of a [`StreamEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
  RunStarted,
  NodeStarted,
  NodeCompleted,
  NodeFailed,
  StageComplete,
  RunCompleted,
  RunFailed,
}

impl StreamEvent {
  pub fn event_type(&self) -> EventType {
    match self {
      StreamEvent::RunStarted { .. } => EventType::RunStarted,
      StreamEvent::NodeStarted { .. } => EventType::NodeStarted,
      StreamEvent::NodeCompleted { .. } => EventType::NodeCompleted,
      StreamEvent::NodeFailed { .. } => EventType::NodeFailed,
      StreamEvent::StageComplete { .. } => EventType::StageComplete,
      StreamEvent::RunCompleted { .. } => EventType::RunCompleted,
      StreamEvent::RunFailed { .. } => EventType::RunFailed,
    }
  }

  pub fn run_id(&self) -> &str {
    match self {
      StreamEvent::RunStarted { run_id, .. }
      | StreamEvent::NodeStarted { run_id, .. }
      | StreamEvent::NodeCompleted { run_id, .. }
      | StreamEvent::NodeFailed { run_id, .. }
      | StreamEvent::StageComplete { run_id, .. }
      | StreamEvent::RunCompleted { run_id, .. }
      | StreamEvent::RunFailed { run_id, .. } => run_id,
    }
  }

  pub fn node(&self) -> Option<&NodeRef> {
    match self {
      StreamEvent::NodeStarted { node, .. }
      | StreamEvent::NodeCompleted { node, .. }
      | StreamEvent::NodeFailed { node, .. }
      | StreamEvent::StageComplete { node, .. } => Some(node),
      _ => None,
    }
  }

  pub fn metrics(&self) -> Option<&RunMetrics> {
    match self {
      StreamEvent::RunCompleted { metrics, .. } | StreamEvent::RunFailed { metrics, .. } => {
        Some(metrics)
      }
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      StreamEvent::NodeFailed { error, .. } | StreamEvent::RunFailed { error, .. } => Some(error),
      _ => None,
    }
  }

  /// Whether this is the last event of a run.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      StreamEvent::RunCompleted { .. } | StreamEvent::RunFailed { .. }
    )
  }
}

/// Lifecycle of a run. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  NotStarted,
  Running,
  Completed,
  Failed,
  Cancelled,
}

impl RunState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunState::Completed | RunState::Failed | RunState::Cancelled
    )
  }

  pub fn can_transition_to(&self, next: RunState) -> bool {
    match self {
      RunState::NotStarted => next == RunState::Running,
      RunState::Running => next.is_terminal(),
      _ => false,
    }
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      RunState::NotStarted => "not_started",
      RunState::Running => "running",
      RunState::Completed => "completed",
      RunState::Failed => "failed",
      RunState::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_event_wire_format() {
    let event = StreamEvent::RunFailed {
      run_id: "run-1".to_string(),
      error: "node 'Notify' (n2) failed: boom".to_string(),
      metrics: RunMetrics {
        total_nodes: 3,
        completed_nodes: 1,
        failed_nodes: 1,
      },
    };

    assert_eq!(
      serde_json::to_value(&event).unwrap(),
      json!({
        "type": "run_failed",
        "runId": "run-1",
        "error": "node 'Notify' (n2) failed: boom",
        "metrics": { "totalNodes": 3, "completedNodes": 1, "failedNodes": 1 }
      })
    );
    assert!(event.is_terminal());
    assert_eq!(event.metrics().unwrap().failed_nodes, 1);
  }

  #[test]
  fn test_state_transitions() {
    assert!(RunState::NotStarted.can_transition_to(RunState::Running));
    assert!(!RunState::NotStarted.can_transition_to(RunState::Completed));
    assert!(RunState::Running.can_transition_to(RunState::Cancelled));
    assert!(!RunState::Completed.can_transition_to(RunState::Failed));
    assert!(!RunState::Cancelled.can_transition_to(RunState::Running));
  }
}
