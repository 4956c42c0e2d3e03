//! Named-slot project store.
//!
//! Each slot holds one record:
//! ```text
//! {
//!   "schema_version": 1,
//!   "sha256": "<hex digest of the bundle JSON>",
//!   "bundle": { "project": ..., "resources": { ... } }
//! }
//! ```
//! Records are verified before anything is decoded. Tampered, truncated or
//! foreign records fail closed.

use std::path::PathBuf;

use flicksy_bundle::{Bundle, BundleError, DecodedBundle, from_portable, to_portable};
use flicksy_resources::CodecRegistry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::backend::{DirBackend, StorageBackend};

/// Current slot record schema version.
pub const SLOT_SCHEMA_VERSION: u32 = 1;

/// Slot used when the caller does not name one.
pub const DEFAULT_SLOT: &str = "slot0";

/// Project family used when the caller does not name one.
pub const DEFAULT_FAMILY: &str = "flicksy3";

/// Errors from slot persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no project saved in slot {0:?}")]
    NotFound(String),
    #[error("invalid slot name {0:?}")]
    InvalidSlot(String),
    #[error("corrupt bundle in slot {slot:?}: {reason}")]
    CorruptBundle { slot: String, reason: String },
    #[error("integrity check failed for slot {slot:?}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        slot: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: slot has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

impl StoreError {
    /// Whether the stored data itself is bad, as opposed to missing or unreachable.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::CorruptBundle { .. } | Self::IntegrityMismatch { .. } | Self::SchemaMismatch { .. }
        )
    }
}

/// On-disk record for one slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSlot {
    pub schema_version: u32,
    pub sha256: String,
    pub bundle: serde_json::Value,
}

impl StoredSlot {
    fn seal(bundle: serde_json::Value) -> Result<Self, StoreError> {
        Ok(Self {
            schema_version: SLOT_SCHEMA_VERSION,
            sha256: sha256_hex(&serde_json::to_vec(&bundle)?),
            bundle,
        })
    }

    /// Check the schema version and digest.
    pub fn verify(&self, slot: &str) -> Result<(), StoreError> {
        if self.schema_version != SLOT_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                file_version: self.schema_version,
                expected_version: SLOT_SCHEMA_VERSION,
            });
        }
        let actual = sha256_hex(&serde_json::to_vec(&self.bundle)?);
        if actual != self.sha256 {
            return Err(StoreError::IntegrityMismatch {
                slot: slot.to_string(),
                expected: self.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Where a directory-backed store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub family: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".flicksy"),
            family: DEFAULT_FAMILY.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn open(&self) -> Result<ProjectStore<DirBackend>, StoreError> {
        Ok(ProjectStore::new(
            self.family.clone(),
            DirBackend::open(&self.root)?,
        ))
    }
}

/// Saves and loads bundles under named slots of one project family.
pub struct ProjectStore<B> {
    family: String,
    backend: B,
    codecs: CodecRegistry,
}

impl<B: StorageBackend> ProjectStore<B> {
    pub fn new(family: impl Into<String>, backend: B) -> Self {
        Self::with_codecs(family, backend, CodecRegistry::default())
    }

    pub fn with_codecs(family: impl Into<String>, backend: B, codecs: CodecRegistry) -> Self {
        Self {
            family: family.into(),
            backend,
            codecs,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Persist `bundle` under `slot`, replacing whatever was there.
    pub fn save<T: Serialize>(&mut self, slot: &str, bundle: &Bundle<T>) -> Result<(), StoreError> {
        let key = self.key(slot)?;
        let record = StoredSlot::seal(serde_json::to_value(bundle)?)?;
        let text = serde_json::to_string_pretty(&record)?;
        self.backend.write(&key, &text)?;
        tracing::info!(slot, resources = bundle.resources.len(), "project saved");
        Ok(())
    }

    /// Encode the live resources with this store's codecs, then save.
    pub fn save_decoded<T: Serialize + Clone>(
        &mut self,
        slot: &str,
        bundle: &DecodedBundle<T>,
    ) -> Result<(), StoreError> {
        let portable = to_portable(bundle, &self.codecs)?;
        self.save(slot, &portable)
    }

    /// Load and verify a slot without decoding its resources.
    pub fn load_portable<T: DeserializeOwned>(&self, slot: &str) -> Result<Bundle<T>, StoreError> {
        let key = self.key(slot)?;
        let Some(text) = self.backend.read(&key)? else {
            tracing::debug!(slot, "slot is empty");
            return Err(StoreError::NotFound(slot.to_string()));
        };
        let record: StoredSlot =
            serde_json::from_str(&text).map_err(|e| corrupt(slot, e.to_string()))?;
        if let Err(e) = record.verify(slot) {
            tracing::warn!(slot, error = %e, "slot failed verification");
            return Err(e);
        }
        serde_json::from_value(record.bundle).map_err(|e| corrupt(slot, e.to_string()))
    }

    /// Load a slot and decode every resource.
    pub fn load<T: DeserializeOwned>(&self, slot: &str) -> Result<DecodedBundle<T>, StoreError> {
        let portable = self.load_portable(slot)?;
        let decoded = from_portable(portable, &self.codecs).map_err(|e| {
            if e.is_corrupt() {
                corrupt(slot, e.to_string())
            } else {
                StoreError::Bundle(e)
            }
        })?;
        tracing::info!(slot, resources = decoded.resources.len(), "project loaded");
        Ok(decoded)
    }

    /// Remove a slot. Returns false if it was already empty.
    pub fn delete(&mut self, slot: &str) -> Result<bool, StoreError> {
        let key = self.key(slot)?;
        let removed = self.backend.remove(&key)?;
        if removed {
            tracing::info!(slot, "slot deleted");
        }
        Ok(removed)
    }

    /// Names of every slot in this family, in ascending order.
    pub fn slots(&self) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{}/", self.family);
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|slot| !slot.contains('/'))
            .collect())
    }

    fn key(&self, slot: &str) -> Result<String, StoreError> {
        let unsafe_name = matches!(slot, "" | "." | "..")
            || slot.contains(|c: char| matches!(c, '/' | '\\' | ':'));
        if unsafe_name {
            return Err(StoreError::InvalidSlot(slot.to_string()));
        }
        Ok(format!("{}/{slot}", self.family))
    }
}

fn corrupt(slot: &str, reason: String) -> StoreError {
    tracing::warn!(slot, %reason, "stored bundle is corrupt");
    StoreError::CorruptBundle {
        slot: slot.to_string(),
        reason,
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
