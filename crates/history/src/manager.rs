use std::collections::{BTreeSet, VecDeque};

use flicksy_bundle::{Bundle, BundleError, DecodedBundle, encode_resources, from_portable};
use flicksy_resources::{CodecRegistry, ResourceError, ResourceId, ResourceStore, Surface};

use crate::manifest::Manifest;
use crate::observer::{Change, Observers, SubscriptionId};

/// Errors from history operations.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("no project loaded")]
    Empty,
    #[error("invalid bundle: missing resources {missing:?}, ids out of range {out_of_range:?}")]
    InvalidBundle {
        missing: Vec<ResourceId>,
        out_of_range: Vec<ResourceId>,
    },
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("another history operation is in progress")]
    Busy,
}

/// One undo/redo step: a project snapshot and the resource ids it referenced.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint<T> {
    pub project: T,
    pub live: BTreeSet<ResourceId>,
}

impl<T: Clone> Checkpoint<T> {
    /// Snapshot a project. Costs a project clone, never a pixel copy.
    pub fn capture(project: &T, manifest: &impl Manifest<T>) -> Self {
        Self {
            project: project.clone(),
            live: manifest.resources(project),
        }
    }
}

/// History tuning.
#[derive(Debug, Clone, Default)]
pub struct HistoryConfig {
    /// Maximum number of undo steps kept. Oldest steps are dropped first.
    /// `None` keeps everything.
    pub max_depth: Option<usize>,
}

/// Undo/redo manager over a live, directly mutable present project.
///
/// Collaborators call [`make_checkpoint`](Self::make_checkpoint) *before* a
/// batch of edits, then mutate [`present_mut`](Self::present_mut) and fork
/// any resource they touch. What counts as one undo step is up to them.
pub struct HistoryManager<T, M> {
    manifest: M,
    config: HistoryConfig,
    codecs: CodecRegistry,
    store: ResourceStore,
    present: Option<T>,
    undo_stack: VecDeque<Checkpoint<T>>,
    redo_stack: Vec<Checkpoint<T>>,
    observers: Observers<T>,
}

impl<T: Clone, M: Manifest<T>> HistoryManager<T, M> {
    /// Create an empty manager. Nothing can be edited until a bundle is loaded.
    pub fn new(manifest: M) -> Self {
        Self::with_config(manifest, HistoryConfig::default(), CodecRegistry::default())
    }

    pub fn with_config(manifest: M, config: HistoryConfig, codecs: CodecRegistry) -> Self {
        Self {
            manifest,
            config,
            codecs,
            store: ResourceStore::new(),
            present: None,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// Replace the present project and resources, clearing both stacks.
    ///
    /// Every id the project's manifest names must be in the bundle, and every
    /// bundled id must be storable (at most [`ResourceId::MAX`]). Nothing
    /// changes if validation fails.
    pub fn load_bundle(&mut self, bundle: DecodedBundle<T>) -> Result<(), HistoryError> {
        let live = self.manifest.resources(&bundle.project);
        let missing: Vec<ResourceId> = live
            .iter()
            .filter(|id| !bundle.resources.contains_key(id))
            .copied()
            .collect();
        let out_of_range: Vec<ResourceId> = bundle
            .resources
            .keys()
            .filter(|id| **id > ResourceId::MAX)
            .copied()
            .collect();
        if !missing.is_empty() || !out_of_range.is_empty() {
            tracing::warn!(?missing, ?out_of_range, "rejecting invalid bundle");
            return Err(HistoryError::InvalidBundle {
                missing,
                out_of_range,
            });
        }

        self.store.clear();
        for (id, surface) in bundle.resources {
            self.store.insert_with_id(id, surface)?;
        }
        self.present = Some(bundle.project);
        self.undo_stack.clear();
        self.redo_stack.clear();
        tracing::info!(
            resources = self.store.len(),
            referenced = live.len(),
            "bundle loaded"
        );
        self.notify(Change::Loaded);
        Ok(())
    }

    /// Decode a portable bundle and load it.
    pub fn load_portable(&mut self, bundle: Bundle<T>) -> Result<(), HistoryError> {
        let decoded = from_portable(bundle, &self.codecs)?;
        self.load_bundle(decoded)
    }

    pub fn is_loaded(&self) -> bool {
        self.present.is_some()
    }

    pub fn present(&self) -> Option<&T> {
        self.present.as_ref()
    }

    /// Mutable access to the present project. Changes are invisible to
    /// history until the next checkpoint.
    pub fn present_mut(&mut self) -> Option<&mut T> {
        self.present.as_mut()
    }

    /// The present project and the resource store, borrowed together so an
    /// editor can fork a resource and repoint the project in one go.
    pub fn edit_parts(&mut self) -> Option<(&mut T, &mut ResourceStore)> {
        let present = self.present.as_mut()?;
        Some((present, &mut self.store))
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.store
    }

    pub fn resources_mut(&mut self) -> &mut ResourceStore {
        &mut self.store
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Record the present state as an undo step and clear the redo stack.
    ///
    /// Call this before a batch of edits: it captures the pre-edit state.
    /// Resources referenced by the present become frozen.
    pub fn make_checkpoint(&mut self) -> Result<(), HistoryError> {
        let present = self.present.as_ref().ok_or(HistoryError::Empty)?;
        let checkpoint = Checkpoint::capture(present, &self.manifest);
        self.store.freeze(&checkpoint.live);
        self.undo_stack.push_back(checkpoint);

        let discarded = self.redo_stack.len();
        self.redo_stack.clear();
        let trimmed = self.trim_to_depth();
        if discarded > 0 || trimmed > 0 {
            self.collect_garbage();
        }
        tracing::debug!(
            undo_depth = self.undo_stack.len(),
            discarded_redo = discarded,
            trimmed,
            "checkpoint recorded"
        );
        Ok(())
    }

    /// Step back one checkpoint. Returns false (a no-op) when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let (Some(present), Some(checkpoint)) = (self.present.as_mut(), self.undo_stack.pop_back())
        else {
            tracing::warn!("nothing to undo");
            return false;
        };
        let current = Checkpoint::capture(&*present, &self.manifest);
        self.store.freeze(&current.live);
        *present = checkpoint.project;
        self.redo_stack.push(current);

        self.collect_garbage();
        tracing::info!(
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "undo"
        );
        self.notify(Change::Undo);
        true
    }

    /// Step forward one checkpoint. Returns false (a no-op) when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let (Some(present), Some(checkpoint)) = (self.present.as_mut(), self.redo_stack.pop())
        else {
            tracing::warn!("nothing to redo");
            return false;
        };
        let current = Checkpoint::capture(&*present, &self.manifest);
        self.store.freeze(&current.live);
        *present = checkpoint.project;
        self.undo_stack.push_back(current);

        self.trim_to_depth();
        self.collect_garbage();
        tracing::info!(
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "redo"
        );
        self.notify(Change::Redo);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of checkpoints on the undo stack.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of checkpoints on the redo stack.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Tell observers an edit batch is done. Implies no undo boundary.
    pub fn changed(&mut self) {
        self.notify(Change::Edited);
    }

    /// Snapshot the present and every resource its manifest reaches.
    ///
    /// All or nothing: on failure no partial bundle is produced and no state
    /// is touched.
    pub fn make_bundle(&self) -> Result<Bundle<T>, HistoryError> {
        self.make_bundle_retaining(std::iter::empty())
    }

    /// Like [`make_bundle`](Self::make_bundle), also carrying `extra`
    /// resources (for example ids still referenced by history).
    pub fn make_bundle_retaining(
        &self,
        extra: impl IntoIterator<Item = ResourceId>,
    ) -> Result<Bundle<T>, HistoryError> {
        let _span = tracing::info_span!("make_bundle").entered();
        let present = self.present.as_ref().ok_or(HistoryError::Empty)?;
        let mut ids = self.manifest.resources(present);
        ids.extend(extra);

        let surfaces = ids
            .iter()
            .map(|&id| self.store.get(id).map(|s| (id, s)))
            .collect::<Result<Vec<(ResourceId, &Surface)>, _>>()?;
        let resources = encode_resources(surfaces, &self.codecs)?;
        tracing::debug!(resources = resources.len(), "bundle encoded");
        Ok(Bundle {
            project: present.clone(),
            resources,
        })
    }

    /// Ids reachable from the present project or any checkpoint on either stack.
    pub fn live_ids(&self) -> BTreeSet<ResourceId> {
        let mut live = self
            .present
            .as_ref()
            .map(|p| self.manifest.resources(p))
            .unwrap_or_default();
        for checkpoint in self.undo_stack.iter().chain(&self.redo_stack) {
            live.extend(checkpoint.live.iter().copied());
        }
        live
    }

    /// Drop every resource no longer reachable. Returns how many were removed.
    pub fn collect_garbage(&mut self) -> usize {
        let live = self.live_ids();
        self.store.collect(&live)
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&Change, &T) + 'static) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Drop the oldest undo steps beyond `max_depth`. Returns how many went.
    fn trim_to_depth(&mut self) -> usize {
        let Some(max) = self.config.max_depth else {
            return 0;
        };
        let excess = self.undo_stack.len().saturating_sub(max);
        self.undo_stack.drain(..excess);
        excess
    }

    fn notify(&mut self, change: Change) {
        if let Some(present) = &self.present {
            self.observers.notify(&change, present);
        }
    }
}
