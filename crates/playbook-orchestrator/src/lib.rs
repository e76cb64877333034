//! Playbook Orchestrator
//!
//! Executes one playbook run: a DAG of typed nodes scheduled in waves,
//! bounded by a run-wide concurrency throttle, reported as a stream of
//! [`StreamEvent`]s.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::execute(request, cancel) -> RunStream
//!   └── RunDriver (spawned)
//!         ├── NodeStore::get_nodes          load + DependencyGraph validation
//!         └── loop over waves
//!               ├── DependencyGraph::next_wave
//!               ├── per node (spawned, bounded by Throttle)
//!               │     ├── ScopeCache        action + scopes, once per action
//!               │     ├── ExecutorRegistry  resolve executor
//!               │     └── validate -> execute -> OutputVariables
//!               └── barrier: every node of the wave finishes
//! ```
//!
//! A failed node fails the run once its wave drains. Cancelling the token
//! ends the stream with `Err(OrchestratorError::Cancelled)` and no terminal
//! event.
//!
//! # Usage
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let orchestrator = Orchestrator::new(store.clone(), store, registry, OrchestratorConfig::default())?;
//! let mut stream = orchestrator.execute(RunRequest::new("intake"), CancellationToken::new());
//! while let Some(event) = stream.next().await {
//!     println!("{:?}", event?);
//! }
//! ```

mod cache;
mod config;
mod driver;
mod error;
mod events;
mod orchestrator;
mod stream;
mod throttle;

pub use config::{DEFAULT_MAX_CONCURRENCY, OrchestratorConfig};
pub use error::OrchestratorError;
pub use events::{EventType, NodeRef, RunMetrics, RunState, StreamEvent};
pub use orchestrator::Orchestrator;
pub use stream::RunStream;
pub use throttle::{Throttle, ThrottlePermit};
