//! Playbook Config
//!
//! This crate contains the serializable data model shared by every other
//! playbook crate. These types describe what a playbook *is* (its nodes and
//! the actions they perform) and what a caller asks for (a [`RunRequest`]).
//!
//! Definitions can be loaded from:
//! - JSON files (via the `playbook` CLI and `FsPlaybookStore`)
//! - Any backing store that implements the store traits
//!
//! Nothing here performs I/O or scheduling. The orchestrator consumes these
//! types, validates the dependency graph and executes it.

mod action;
mod node;
mod playbook;
mod request;

pub use action::{Action, ActionType, ResolvedScopes};
pub use node::Node;
pub use playbook::PlaybookDef;
pub use request::RunRequest;
