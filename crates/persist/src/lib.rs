//! Persistence: save and load bundles under named slots in a local durable store.
//!
//! # Invariants
//! - Slots are independent; saving one never touches another.
//! - A slot write is atomic: readers see the old record or the new one.
//! - Stored records are checksummed; tampering or truncation fails closed.

mod backend;
mod store;

pub use backend::{DirBackend, MemoryBackend, StorageBackend};
pub use store::{
    DEFAULT_FAMILY, DEFAULT_SLOT, ProjectStore, SLOT_SCHEMA_VERSION, StorageConfig, StoreError,
    StoredSlot,
};

pub fn crate_info() -> &'static str {
    "flicksy-persist v0.1.0"
}
