//! Resource store: mutable raster surfaces keyed by store-allocated ids.
//!
//! Resources are never edited in place once a checkpoint has captured them.
//! Editors fork a private copy under a fresh id and edit that instead, so
//! history only has to remember ids, never pixel data.
//!
//! # Invariants
//! - Ids are allocated monotonically and never reused within a session.
//! - A frozen (checkpointed) resource is immutable; `get_mut` refuses it.
//! - `collect` removes exactly the ids outside the live set and never fails.
//! - `decode(encode(s)) == s` for every registered codec.

mod codec;
mod error;
mod store;
mod surface;

pub use codec::{CanvasDataUri, CodecRegistry, EncodedResource, RawRgba, ResourceCodec};
pub use error::ResourceError;
pub use store::{Fork, ResourceId, ResourceStore};
pub use surface::{Rgba, Surface};

pub fn crate_info() -> &'static str {
    "flicksy-resources v0.1.0"
}
