use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use playbook_config::RunRequest;
use playbook_executor::{DryRunExecutor, ExecutorRegistry};
use playbook_graph::DependencyGraph;
use playbook_orchestrator::{
  DEFAULT_MAX_CONCURRENCY, Orchestrator, OrchestratorConfig, OrchestratorError, StreamEvent,
};
use playbook_store::{FsPlaybookStore, NodeStore, ScopeResolver};

/// Playbook - run document-processing playbooks as dependency-ordered waves
#[derive(Parser)]
#[command(name = "playbook")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Directory holding `<playbook-id>.json` definitions
  #[arg(long, global = true, env = "PLAYBOOK_STORE_DIR", default_value = "playbooks")]
  store_dir: PathBuf,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a playbook with dry-run executors, printing events as JSON lines
  Run {
    /// The playbook to execute
    playbook_id: String,

    /// Document to process (repeatable)
    #[arg(long = "document")]
    documents: Vec<String>,

    /// Maximum nodes executing at once
    #[arg(long, env = "PLAYBOOK_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Tenant placed in every execution context
    #[arg(long, env = "PLAYBOOK_TENANT")]
    tenant: Option<String>,
  },

  /// Check a playbook's graph and executors and print its wave plan
  Validate {
    /// The playbook to check
    playbook_id: String,
  },

  /// List action types with a registered executor
  Actions,
}

fn main() -> Result<()> {
  // Logs go to stderr so stdout stays a clean event stream
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("playbook=info,warn")),
    )
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      playbook_id,
      documents,
      max_concurrency,
      tenant,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_playbook(
        cli.store_dir,
        playbook_id,
        documents,
        max_concurrency,
        tenant,
      ))?;
    }
    Some(Commands::Validate { playbook_id }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(validate_playbook(cli.store_dir, playbook_id))?;
    }
    Some(Commands::Actions) => {
      for action_type in dry_run_registry()?.supported_action_types() {
        println!("{}", action_type);
      }
    }
    None => {
      println!("playbook - use --help to see available commands");
    }
  }

  Ok(())
}

fn dry_run_registry() -> Result<Arc<ExecutorRegistry>> {
  let registry =
    ExecutorRegistry::new(DryRunExecutor::all()).context("failed to build executor registry")?;
  Ok(Arc::new(registry))
}

async fn run_playbook(
  store_dir: PathBuf,
  playbook_id: String,
  documents: Vec<String>,
  max_concurrency: usize,
  tenant: Option<String>,
) -> Result<()> {
  let store = Arc::new(FsPlaybookStore::new(store_dir));
  let config = OrchestratorConfig {
    max_concurrency,
    ..Default::default()
  };
  let orchestrator = Orchestrator::new(store.clone(), store, dry_run_registry()?, config)
    .context("invalid orchestrator configuration")?;

  let mut request = RunRequest::new(&playbook_id).with_documents(documents);
  if let Some(tenant) = tenant {
    request = request.with_tenant(tenant);
  }

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("Interrupted, cancelling run");
      on_interrupt.cancel();
    }
  });

  let mut stream = orchestrator.execute(request, cancel);
  let run_id = stream.run_id().to_string();
  info!(run_id = %run_id, playbook_id = %playbook_id, "Started run");

  let mut terminal = None;
  while let Some(item) = stream.next().await {
    let event = match item {
      Ok(event) => event,
      Err(OrchestratorError::Cancelled) => bail!("run {} cancelled", run_id),
      Err(e) => return Err(e).with_context(|| format!("run {} aborted", run_id)),
    };

    println!("{}", serde_json::to_string(&event)?);
    if event.is_terminal() {
      terminal = Some(event);
    }
  }

  match terminal {
    Some(StreamEvent::RunCompleted { metrics, .. }) => {
      info!(
        run_id = %run_id,
        completed = metrics.completed_nodes,
        total = metrics.total_nodes,
        "Run completed"
      );
      Ok(())
    }
    Some(StreamEvent::RunFailed { error, .. }) => {
      bail!("playbook '{}' failed: {}", playbook_id, error)
    }
    _ => bail!("run {} ended without a terminal event", run_id),
  }
}

async fn validate_playbook(store_dir: PathBuf, playbook_id: String) -> Result<()> {
  let store = FsPlaybookStore::new(store_dir);
  let nodes = store
    .get_nodes(&playbook_id)
    .await
    .with_context(|| format!("failed to load playbook '{}'", playbook_id))?;

  let graph = DependencyGraph::new(nodes).context("invalid dependency graph")?;
  graph
    .validate_acyclic()
    .context("invalid dependency graph")?;

  let registry = dry_run_registry()?;
  let mut problems = Vec::new();
  for node in graph.nodes() {
    match store.get_action(&node.action_id).await {
      Ok(action) if !registry.has_executor(action.action_type) => problems.push(format!(
        "node '{}' uses action type '{}' which has no executor",
        node.node_id, action.action_type
      )),
      Ok(_) => {}
      Err(e) => problems.push(format!("node '{}': {}", node.node_id, e)),
    }
  }
  if !problems.is_empty() {
    for problem in &problems {
      warn!(playbook_id = %playbook_id, "{}", problem);
    }
    bail!(
      "playbook '{}' has {} unresolvable node(s)",
      playbook_id,
      problems.len()
    );
  }

  println!(
    "Playbook '{}' is valid: {} active node(s)",
    playbook_id,
    graph.len()
  );
  for (i, wave) in graph.plan().iter().enumerate() {
    let names: Vec<String> = wave
      .iter()
      .map(|n| format!("{} ({})", n.name, n.node_id))
      .collect();
    println!("  wave {}: {}", i + 1, names.join(", "));
  }

  Ok(())
}
