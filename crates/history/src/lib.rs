//! History: checkpoint-based undo/redo over an application-defined project.
//!
//! The project type is opaque. The only thing the history knows about it is
//! the manifest function handed to the constructor, which lists the resource
//! ids a project references. Checkpoints store a project clone plus that id
//! set; resource pixels are never copied here, only forked by editors.
//!
//! # Invariants
//! - A resource reachable from the present project or from any checkpoint on
//!   either stack is never collected.
//! - Checkpointed resources are frozen; edits go through a fork.
//! - Observers are notified only after a state change is complete.
//! - A failed load or export leaves present, stacks, and store untouched.

mod manager;
mod manifest;
mod observer;
mod shared;

pub use manager::{Checkpoint, HistoryConfig, HistoryError, HistoryManager};
pub use manifest::Manifest;
pub use observer::{Change, Observers, SubscriptionId};
pub use shared::{SharedHistory, WeakHistory};

pub fn crate_info() -> &'static str {
    "flicksy-history v0.1.0"
}
