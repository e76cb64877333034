//! The orchestrator entry point.

use std::sync::Arc;

use playbook_config::RunRequest;
use playbook_executor::ExecutorRegistry;
use playbook_store::{NodeStore, ScopeResolver};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::cache::ScopeCache;
use crate::config::OrchestratorConfig;
use crate::driver::RunDriver;
use crate::error::OrchestratorError;
use crate::events::RunState;
use crate::stream::RunStream;

/// Executes playbook runs.
///
/// One orchestrator serves any number of runs; each run gets its own
/// throttle, scope cache and output map.
pub struct Orchestrator {
  node_store: Arc<dyn NodeStore>,
  scope_resolver: Arc<dyn ScopeResolver>,
  registry: Arc<ExecutorRegistry>,
  config: OrchestratorConfig,
}

impl Orchestrator {
  pub fn new(
    node_store: Arc<dyn NodeStore>,
    scope_resolver: Arc<dyn ScopeResolver>,
    registry: Arc<ExecutorRegistry>,
    config: OrchestratorConfig,
  ) -> Result<Self, OrchestratorError> {
    config.validate()?;
    Ok(Self {
      node_store,
      scope_resolver,
      registry,
      config,
    })
  }

  pub fn config(&self) -> &OrchestratorConfig {
    &self.config
  }

  pub fn registry(&self) -> &ExecutorRegistry {
    &self.registry
  }

  /// Start a run and return its event stream.
  ///
  /// The run is driven on a spawned task, so this must be called from
  /// within a Tokio runtime. Cancelling `cancel` ends the run.
  #[instrument(
    name = "orchestrator_execute",
    skip(self, request, cancel),
    fields(playbook_id = %request.playbook_id)
  )]
  pub fn execute(&self, request: RunRequest, cancel: CancellationToken) -> RunStream {
    let run_id = uuid::Uuid::new_v4().to_string();
    let run_cancel = cancel.child_token();
    let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer);
    let (state_tx, state_rx) = watch::channel(RunState::NotStarted);

    let tenant_id = request
      .tenant_id
      .clone()
      .unwrap_or_else(|| self.config.tenant_id.clone());

    debug!(run_id = %run_id, tenant_id = %tenant_id, "spawning run driver");

    let driver = RunDriver {
      run_id: run_id.clone(),
      request,
      tenant_id,
      max_concurrency: self.config.max_concurrency,
      validate_graph: self.config.validate_graph,
      node_store: self.node_store.clone(),
      scopes: ScopeCache::new(self.scope_resolver.clone()),
      registry: self.registry.clone(),
      events: events_tx,
      state: state_tx,
      cancel: run_cancel.clone(),
    };
    tokio::spawn(driver.run());

    RunStream::new(run_id, events_rx, state_rx, run_cancel)
  }
}
