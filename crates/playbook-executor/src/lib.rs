//! Playbook Executor
//!
//! The contract between the orchestrator and the code that actually performs
//! a node's work.
//!
//! - [`NodeExecutor`] validates a node's configuration and executes it
//! - [`ExecutorRegistry`] maps each [`ActionType`](playbook_config::ActionType)
//!   to the executor that handles it
//! - [`ExecutionContext`] is everything an executor sees for one node
//! - [`OutputVariables`] is the run's append-only output map
//!
//! [`DryRunExecutor`] implements the built-in action types without any I/O
//! so playbooks can be exercised end to end.

mod context;
mod dry_run;
mod error;
mod executor;
mod output;
mod registry;

pub use context::{ExecutionContext, OutputVariables, OutputView};
pub use dry_run::DryRunExecutor;
pub use error::{ExecutorError, OutputConflict, RegistryError};
pub use executor::NodeExecutor;
pub use output::{NodeOutput, ValidationResult};
pub use registry::ExecutorRegistry;
