//! Bundles: one project state plus exactly the resources it depends on, in a
//! flat, self-contained, JSON-serializable form.
//!
//! # Invariants
//! - A portable bundle round-trips: `from_portable(to_portable(b)) == b`.
//! - Decode failures are surfaced as corruption, never silently repaired.
//! - An embedded bundle can never terminate its host element early.

mod bundle;
mod document;

pub use bundle::{
    Bundle, BundleError, DecodedBundle, decode_resources, encode_resources, from_portable,
    to_portable,
};
pub use document::{
    BUNDLE_ANCHOR_ID, HostDocument, HtmlDocument, embed_in_document, extract_from_document,
};

pub fn crate_info() -> &'static str {
    "flicksy-bundle v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("bundle"));
    }
}
