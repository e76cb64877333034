//! The run driver.
//!
//! Loads a playbook's nodes, walks the dependency graph wave by wave and
//! reports progress on the run's event channel. Node tasks never write to
//! that channel themselves: they signal the driver, which forwards their
//! events and emits everything else, so nothing is emitted once the driver
//! has observed cancellation.

use std::collections::HashSet;
use std::sync::Arc;

use playbook_config::{Node, RunRequest};
use playbook_executor::{
  ExecutionContext, ExecutorError, ExecutorRegistry, NodeOutput, OutputVariables,
};
use playbook_graph::{DependencyGraph, GraphError};
use playbook_store::NodeStore;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::ScopeCache;
use crate::error::OrchestratorError;
use crate::events::{NodeRef, RunMetrics, RunState, StreamEvent};
use crate::throttle::{Throttle, ThrottlePermit};

pub(crate) type EventSender = mpsc::Sender<Result<StreamEvent, OrchestratorError>>;

/// Drives a single run to completion.
pub(crate) struct RunDriver {
  pub run_id: String,
  pub request: RunRequest,
  pub tenant_id: String,
  pub max_concurrency: usize,
  pub validate_graph: bool,
  pub node_store: Arc<dyn NodeStore>,
  pub scopes: ScopeCache,
  pub registry: Arc<ExecutorRegistry>,
  pub events: EventSender,
  pub state: watch::Sender<RunState>,
  pub cancel: CancellationToken,
}

/// How a node task ended.
enum NodeOutcome {
  Succeeded,
  Failed(String),
  Cancelled,
  /// Infrastructure failure that ends the run without a terminal event.
  Aborted(OrchestratorError),
}

#[derive(Default)]
struct WaveReport {
  succeeded: Vec<String>,
  failed: Vec<(NodeRef, String)>,
}

impl RunDriver {
  /// Run to completion. Errors end the stream as its final item.
  #[instrument(
    name = "playbook_run",
    skip(self),
    fields(
      run_id = %self.run_id,
      playbook_id = %self.request.playbook_id,
    )
  )]
  pub async fn run(self) {
    match self.drive().await {
      Ok(()) => {}
      Err(OrchestratorError::StreamClosed) => {
        warn!(run_id = %self.run_id, "event stream dropped, cancelling run");
        self.cancel.cancel();
        self.transition(RunState::Cancelled);
      }
      Err(OrchestratorError::Cancelled) => {
        warn!(run_id = %self.run_id, "run_cancelled");
        self.transition(RunState::Cancelled);
        let _ = self.events.send(Err(OrchestratorError::Cancelled)).await;
      }
      Err(e) => {
        error!(run_id = %self.run_id, error = %e, "run_aborted");
        self.transition(RunState::Failed);
        let _ = self.events.send(Err(e)).await;
      }
    }
  }

  async fn drive(&self) -> Result<(), OrchestratorError> {
    self.transition(RunState::Running);
    info!(
      run_id = %self.run_id,
      playbook_id = %self.request.playbook_id,
      tenant_id = %self.tenant_id,
      documents = self.request.document_ids.len(),
      "run_started"
    );
    self
      .emit(StreamEvent::RunStarted {
        run_id: self.run_id.clone(),
        playbook_id: self.request.playbook_id.clone(),
      })
      .await?;

    let graph = self.load_graph().await?;
    let mut metrics = RunMetrics {
      total_nodes: graph.len(),
      ..Default::default()
    };

    let throttle = Throttle::new(self.max_concurrency);
    let outputs = OutputVariables::new();
    let document_ids: Arc<[String]> = self.request.document_ids.clone().into();
    let mut completed: HashSet<String> = HashSet::new();
    let mut started: HashSet<String> = HashSet::new();
    let mut wave = owned(graph.next_wave(&completed, &started));
    let mut wave_number = 0usize;

    loop {
      if self.cancel.is_cancelled() {
        return Err(OrchestratorError::Cancelled);
      }

      if wave.is_empty() {
        if completed.len() == graph.len() {
          info!(run_id = %self.run_id, nodes = graph.len(), "run_completed");
          return self
            .finish(
              RunState::Completed,
              StreamEvent::RunCompleted {
                run_id: self.run_id.clone(),
                metrics,
              },
            )
            .await;
        }

        // Only reachable when cycle validation is disabled
        let unreached: Vec<&str> = graph
          .nodes()
          .iter()
          .filter(|n| !started.contains(&n.node_id))
          .map(|n| n.node_id.as_str())
          .collect();
        let error = format!(
          "no runnable nodes remain; unreached: {}",
          unreached.join(", ")
        );
        error!(run_id = %self.run_id, error = %error, "run_failed");
        return self
          .finish(
            RunState::Failed,
            StreamEvent::RunFailed {
              run_id: self.run_id.clone(),
              error,
              metrics,
            },
          )
          .await;
      }

      wave_number += 1;
      let wave_ids: Vec<&str> = wave.iter().map(|n| n.node_id.as_str()).collect();
      info!(
        run_id = %self.run_id,
        wave = wave_number,
        nodes = ?wave_ids,
        "wave_started"
      );
      started.extend(wave.iter().map(|n| n.node_id.clone()));

      let report = self
        .execute_wave(&wave, &throttle, &outputs, &document_ids)
        .await?;
      metrics.completed_nodes += report.succeeded.len();
      metrics.failed_nodes += report.failed.len();
      completed.extend(report.succeeded);

      if let Some((node, node_error)) = report.failed.first() {
        let mut error = format!(
          "node '{}' ({}) failed: {}",
          node.name, node.node_id, node_error
        );
        if report.failed.len() > 1 {
          error.push_str(&format!(" (and {} more)", report.failed.len() - 1));
        }
        error!(run_id = %self.run_id, error = %error, "run_failed");
        return self
          .finish(
            RunState::Failed,
            StreamEvent::RunFailed {
              run_id: self.run_id.clone(),
              error,
              metrics,
            },
          )
          .await;
      }

      let next = owned(graph.next_wave(&completed, &started));
      for node in &wave {
        let gates_next = next
          .iter()
          .any(|n| graph.upstream(&n.node_id).contains(&node.node_id));
        if gates_next {
          self
            .emit(StreamEvent::StageComplete {
              run_id: self.run_id.clone(),
              node: NodeRef::from(node),
            })
            .await?;
        }
      }
      wave = next;
    }
  }

  async fn load_graph(&self) -> Result<DependencyGraph, OrchestratorError> {
    let playbook_id = &self.request.playbook_id;

    let loaded = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return Err(OrchestratorError::Cancelled),
      loaded = self.node_store.get_nodes(playbook_id) => loaded,
    };
    let nodes = loaded.map_err(|source| OrchestratorError::NodeStore {
      playbook_id: playbook_id.clone(),
      source,
    })?;

    let invalid = |source: GraphError| OrchestratorError::InvalidPlaybook {
      playbook_id: playbook_id.clone(),
      source,
    };
    let graph = DependencyGraph::new(nodes).map_err(invalid)?;
    if self.validate_graph {
      graph.validate_acyclic().map_err(invalid)?;
    }

    debug!(run_id = %self.run_id, nodes = graph.len(), "playbook loaded");
    Ok(graph)
  }

  /// Run every node of a wave and wait for all of them.
  async fn execute_wave(
    &self,
    wave: &[Node],
    throttle: &Throttle,
    outputs: &OutputVariables,
    document_ids: &Arc<[String]>,
  ) -> Result<WaveReport, OrchestratorError> {
    let (signal_tx, mut signals) = mpsc::unbounded_channel();
    let mut tasks: Vec<(NodeRef, JoinHandle<NodeOutcome>)> = Vec::with_capacity(wave.len());
    let mut admissions = Vec::with_capacity(wave.len());

    for node in wave {
      let (admit, admission) = oneshot::channel();
      admissions.push(admit);
      let task = NodeTask {
        run_id: self.run_id.clone(),
        playbook_id: self.request.playbook_id.clone(),
        tenant_id: self.tenant_id.clone(),
        document_ids: document_ids.clone(),
        node: Arc::new(node.clone()),
        admission,
        scopes: self.scopes.clone(),
        registry: self.registry.clone(),
        outputs: outputs.clone(),
        signals: signal_tx.clone(),
        cancel: self.cancel.clone(),
      };
      tasks.push((NodeRef::from(node), tokio::spawn(task.run())));
    }
    drop(signal_tx);
    let admitter = tokio::spawn(admit_in_order(
      throttle.clone(),
      admissions,
      self.cancel.clone(),
    ));

    // The channel closes once every task has finished
    let mut announced: HashSet<String> = HashSet::new();
    loop {
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => {
          warn!(run_id = %self.run_id, "run cancelled during wave");
          abort_wave(&admitter, &tasks);
          return Err(OrchestratorError::Cancelled);
        }
        signal = signals.recv() => match signal {
          Some(event) => {
            if let StreamEvent::NodeStarted { node, .. } = &event {
              announced.insert(node.node_id.clone());
            }
            if let Err(e) = self.emit(event).await {
              self.cancel.cancel();
              abort_wave(&admitter, &tasks);
              return Err(e);
            }
          }
          None => break,
        },
      }
    }

    let mut report = WaveReport::default();
    let mut abort: Option<OrchestratorError> = None;
    let mut cancelled = false;

    for (node, handle) in tasks {
      let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(join_error) => {
          let started = announced.contains(&node.node_id);
          let error = match (join_error.is_panic(), started) {
            (true, true) => "executor panicked".to_string(),
            (true, false) => "node panicked before execution".to_string(),
            (false, _) => format!("node task ended unexpectedly: {}", join_error),
          };
          error!(run_id = %self.run_id, node_id = %node.node_id, error = %error, "node_failed");
          // NodeFailed is always preceded by the node's NodeStarted
          if !started {
            self
              .emit(StreamEvent::NodeStarted {
                run_id: self.run_id.clone(),
                node: node.clone(),
              })
              .await?;
          }
          self
            .emit(StreamEvent::NodeFailed {
              run_id: self.run_id.clone(),
              node: node.clone(),
              error: error.clone(),
            })
            .await?;
          NodeOutcome::Failed(error)
        }
      };

      match outcome {
        NodeOutcome::Succeeded => report.succeeded.push(node.node_id),
        NodeOutcome::Failed(error) => report.failed.push((node, error)),
        NodeOutcome::Cancelled => cancelled = true,
        NodeOutcome::Aborted(e) => {
          if abort.is_none() {
            abort = Some(e);
          } else {
            warn!(run_id = %self.run_id, error = %e, "additional infrastructure failure in wave");
          }
        }
      }
    }

    if cancelled {
      self.cancel.cancel();
      return Err(OrchestratorError::Cancelled);
    }
    if let Some(e) = abort {
      return Err(e);
    }
    Ok(report)
  }

  async fn emit(&self, event: StreamEvent) -> Result<(), OrchestratorError> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(OrchestratorError::Cancelled),
      sent = self.events.send(Ok(event)) => sent.map_err(|_| OrchestratorError::StreamClosed),
    }
  }

  /// Emit a terminal event, then settle the run state.
  async fn finish(&self, state: RunState, event: StreamEvent) -> Result<(), OrchestratorError> {
    self.emit(event).await?;
    self.transition(state);
    Ok(())
  }

  fn transition(&self, next: RunState) {
    self.state.send_if_modified(|current| {
      if !current.can_transition_to(next) {
        return false;
      }
      debug!(run_id = %self.run_id, from = %current, to = %next, "run state changed");
      *current = next;
      true
    });
  }
}

fn owned(nodes: Vec<&Node>) -> Vec<Node> {
  nodes.into_iter().cloned().collect()
}

fn abort_wave(admitter: &JoinHandle<()>, tasks: &[(NodeRef, JoinHandle<NodeOutcome>)]) {
  admitter.abort();
  for (_, handle) in tasks {
    handle.abort();
  }
}

/// Hand throttle slots to a wave's nodes one at a time, in wave order.
///
/// The throttle queues waiters first come first served, so a single admitter
/// keeps admission in execution order. Stops handing out slots on cancel,
/// which leaves the remaining nodes to observe a closed admission.
async fn admit_in_order(
  throttle: Throttle,
  admissions: Vec<oneshot::Sender<ThrottlePermit>>,
  cancel: CancellationToken,
) {
  for admit in admissions {
    let Ok(permit) = throttle.acquire(&cancel).await else {
      return;
    };
    debug!(available = throttle.available(), "throttle slot granted");
    // A node task that already ended hands the slot straight back
    let _ = admit.send(permit);
  }
}

/// One node's execution within a wave.
struct NodeTask {
  run_id: String,
  playbook_id: String,
  tenant_id: String,
  document_ids: Arc<[String]>,
  node: Arc<Node>,
  admission: oneshot::Receiver<ThrottlePermit>,
  scopes: ScopeCache,
  registry: Arc<ExecutorRegistry>,
  outputs: OutputVariables,
  signals: mpsc::UnboundedSender<StreamEvent>,
  cancel: CancellationToken,
}

impl NodeTask {
  #[instrument(
    name = "node_execute",
    skip(self),
    fields(
      run_id = %self.run_id,
      node_id = %self.node.node_id,
    )
  )]
  async fn run(mut self) -> NodeOutcome {
    // Held until the node's output is published
    let admission = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return NodeOutcome::Cancelled,
      admission = &mut self.admission => admission,
    };
    let Ok(_permit) = admission else {
      return NodeOutcome::Cancelled;
    };

    let resolved = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return NodeOutcome::Cancelled,
      resolved = self.scopes.get_or_resolve(&self.node.action_id) => resolved,
    };
    let resolved = match resolved {
      Ok(resolved) => resolved,
      Err(source) => {
        error!(action_id = %self.node.action_id, error = %source, "scope_resolution_failed");
        return NodeOutcome::Aborted(OrchestratorError::ScopeResolution {
          node_id: self.node.node_id.clone(),
          action_id: self.node.action_id.clone(),
          source,
        });
      }
    };

    let ctx = ExecutionContext {
      run_id: self.run_id.clone(),
      playbook_id: self.playbook_id.clone(),
      node: self.node.clone(),
      action_type: resolved.action.action_type,
      action: resolved.action,
      scopes: resolved.scopes,
      tenant_id: self.tenant_id.clone(),
      document_ids: self.document_ids.clone(),
      outputs: self.outputs.view(),
    };

    let node = NodeRef::from(self.node.as_ref());
    info!(action_type = %ctx.action_type, "node_started");
    self.signal(StreamEvent::NodeStarted {
      run_id: self.run_id.clone(),
      node: node.clone(),
    });

    let Some(output) = self.invoke(&ctx).await else {
      warn!("node cancelled");
      return NodeOutcome::Cancelled;
    };
    let output = self.publish(output);

    if output.success {
      info!("node_completed");
      self.signal(StreamEvent::NodeCompleted {
        run_id: self.run_id.clone(),
        node,
        output,
      });
      NodeOutcome::Succeeded
    } else {
      let error = output.error_message().to_string();
      warn!(error = %error, "node_failed");
      self.signal(StreamEvent::NodeFailed {
        run_id: self.run_id.clone(),
        node,
        error: error.clone(),
      });
      NodeOutcome::Failed(error)
    }
  }

  /// Resolve, validate and execute. `None` means cancelled.
  async fn invoke(&self, ctx: &ExecutionContext) -> Option<NodeOutput> {
    let executor = match self.registry.get(ctx.action_type) {
      Ok(executor) => executor,
      Err(e) => {
        warn!(error = %e, "executor lookup failed");
        return Some(NodeOutput::failed(&self.node, e.to_string()));
      }
    };

    let validation = executor.validate(ctx);
    if !validation.valid {
      warn!(errors = ?validation.errors, "node_validation_failed");
      return Some(NodeOutput::failed(&self.node, validation.message()));
    }

    let result = tokio::select! {
      biased;
      _ = self.cancel.cancelled() => return None,
      result = executor.execute(ctx, self.cancel.clone()) => result,
    };

    match result {
      Ok(output) => Some(output),
      Err(ExecutorError::Cancelled) => None,
      Err(e) => Some(NodeOutput::failed(&self.node, e.to_string())),
    }
  }

  /// Stamp the output with this node's identity and record it.
  fn publish(&self, mut output: NodeOutput) -> NodeOutput {
    output.node_id = self.node.node_id.clone();
    output.output_variable = self.node.output_key().to_string();
    if !output.success && output.error.is_none() {
      output.error = Some("executor reported failure without an error".to_string());
    }

    if let Err(conflict) = self.outputs.insert(self.node.output_key(), output.clone()) {
      return NodeOutput::failed(&self.node, conflict.to_string());
    }
    output
  }

  fn signal(&self, event: StreamEvent) {
    // The driver only drops the receiver after aborting this task
    let _ = self.signals.send(event);
  }
}
