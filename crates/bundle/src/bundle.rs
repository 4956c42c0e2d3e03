use std::collections::BTreeMap;

use flicksy_resources::{CodecRegistry, EncodedResource, ResourceError, ResourceId, Surface};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors from bundle encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("corrupt bundle: resource {id} failed to decode: {source}")]
    CorruptResource {
        id: ResourceId,
        source: ResourceError,
    },
    #[error("corrupt bundle: {0}")]
    CorruptJson(#[from] serde_json::Error),
    #[error("failed to encode resource {id}: {source}")]
    Encode {
        id: ResourceId,
        source: ResourceError,
    },
}

impl BundleError {
    /// Whether this error means the input data itself is bad.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptResource { .. } | Self::CorruptJson(_))
    }
}

/// Portable bundle: `{ "project": ..., "resources": { "<id>": { "type", "data" } } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle<T> {
    pub project: T,
    pub resources: BTreeMap<ResourceId, EncodedResource>,
}

impl<T: Serialize> Bundle<T> {
    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<T: DeserializeOwned> Bundle<T> {
    /// Parse a bundle. The project's own `Deserialize` is its schema check.
    pub fn from_json(json: &str) -> Result<Self, BundleError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// In-memory bundle: the project plus live, decoded surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBundle<T> {
    pub project: T,
    pub resources: BTreeMap<ResourceId, Surface>,
}

/// Encode every resource in `bundle` with the registry's default kind.
pub fn to_portable<T: Clone>(
    bundle: &DecodedBundle<T>,
    codecs: &CodecRegistry,
) -> Result<Bundle<T>, BundleError> {
    Ok(Bundle {
        project: bundle.project.clone(),
        resources: encode_resources(
            bundle.resources.iter().map(|(id, s)| (*id, s)),
            codecs,
        )?,
    })
}

/// Decode every resource payload. Any failure rejects the whole bundle.
pub fn from_portable<T>(
    bundle: Bundle<T>,
    codecs: &CodecRegistry,
) -> Result<DecodedBundle<T>, BundleError> {
    Ok(DecodedBundle {
        resources: decode_resources(&bundle.resources, codecs)?,
        project: bundle.project,
    })
}

/// Encode a set of surfaces. All or nothing: no partial table is returned.
pub fn encode_resources<'a>(
    resources: impl IntoIterator<Item = (ResourceId, &'a Surface)>,
    codecs: &CodecRegistry,
) -> Result<BTreeMap<ResourceId, EncodedResource>, BundleError> {
    let _span = tracing::debug_span!("encode_resources").entered();
    resources
        .into_iter()
        .map(|(id, surface)| {
            codecs
                .encode(surface)
                .map(|encoded| (id, encoded))
                .map_err(|source| BundleError::Encode { id, source })
        })
        .collect()
}

pub fn decode_resources(
    resources: &BTreeMap<ResourceId, EncodedResource>,
    codecs: &CodecRegistry,
) -> Result<BTreeMap<ResourceId, Surface>, BundleError> {
    let _span = tracing::debug_span!("decode_resources", count = resources.len()).entered();
    resources
        .iter()
        .map(|(&id, encoded)| {
            codecs.decode(encoded).map(|s| (id, s)).map_err(|source| {
                tracing::warn!(%id, kind = %encoded.kind, "resource payload failed to decode");
                BundleError::CorruptResource { id, source }
            })
        })
        .collect()
}
