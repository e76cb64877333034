//! Playbook Store
//!
//! Adapters the orchestrator uses to load a run's inputs:
//! - [`NodeStore`] supplies the ordered node list for a playbook
//! - [`ScopeResolver`] supplies action metadata and authorization scopes
//!
//! Two implementations ship with the crate: [`MemoryStore`] for embedding and
//! tests, and [`FsPlaybookStore`] which reads `{root}/{playbook_id}.json`.

mod error;
mod fs_store;
mod memory;
mod store;

pub use error::StoreError;
pub use fs_store::FsPlaybookStore;
pub use memory::MemoryStore;
pub use store::{NodeStore, ScopeResolver};
