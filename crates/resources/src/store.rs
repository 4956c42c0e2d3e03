use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ResourceError;
use crate::surface::Surface;

/// Store-allocated resource identifier.
///
/// Serialized as a decimal string (`"1"`) so it can key a JSON object and be
/// referenced from project data with the same spelling. Deserialization also
/// accepts a bare unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Largest id a store can hold. `u64::MAX` is kept out of range so the
    /// allocator can always step past any stored id.
    pub const MAX: ResourceId = ResourceId(u64::MAX - 1);
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ResourceId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a resource id as a decimal string or unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ResourceId, E> {
                Ok(ResourceId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ResourceId, E> {
                u64::try_from(v)
                    .map(ResourceId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ResourceId, E> {
                v.parse()
                    .map(ResourceId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// A freshly forked resource: its new id and the private, writable copy.
#[derive(Debug)]
pub struct Fork<'a> {
    pub id: ResourceId,
    pub instance: &'a mut Surface,
}

/// Copy-on-write store of raster resources.
///
/// Liveness is not tracked here. Callers compute the live set (from a project
/// manifest plus whatever history retains) and hand it to [`collect`](Self::collect).
#[derive(Debug, Clone)]
pub struct ResourceStore {
    resources: BTreeMap<ResourceId, Surface>,
    /// Ids captured by a checkpoint. These must be forked, not edited.
    frozen: BTreeSet<ResourceId>,
    next_id: u64,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            frozen: BTreeSet::new(),
            next_id: 1,
        }
    }
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a resource by id.
    pub fn get(&self, id: ResourceId) -> Result<&Surface, ResourceError> {
        self.resources.get(&id).ok_or(ResourceError::NotFound(id))
    }

    /// Get a resource for in-place editing.
    ///
    /// Only resources no checkpoint has captured may be edited in place;
    /// anything else has to go through [`fork`](Self::fork).
    pub fn get_mut(&mut self, id: ResourceId) -> Result<&mut Surface, ResourceError> {
        if self.frozen.contains(&id) {
            return Err(ResourceError::Frozen(id));
        }
        self.resources.get_mut(&id).ok_or(ResourceError::NotFound(id))
    }

    /// Store a new resource under a freshly allocated id.
    pub fn add(&mut self, surface: Surface) -> Result<ResourceId, ResourceError> {
        let (id, _) = self.insert_fresh(surface)?;
        tracing::debug!(%id, "resource added");
        Ok(id)
    }

    /// Store a resource under a specific id (used when seeding from a bundle).
    ///
    /// Moves the allocator past `id` so later allocations never collide.
    /// Fails with `IdOutOfRange` for ids above [`ResourceId::MAX`].
    pub fn insert_with_id(
        &mut self,
        id: ResourceId,
        surface: Surface,
    ) -> Result<(), ResourceError> {
        if id > ResourceId::MAX {
            return Err(ResourceError::IdOutOfRange(id));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.frozen.remove(&id);
        self.resources.insert(id, surface);
        Ok(())
    }

    /// Deep-copy the resource at `id` under a fresh id.
    ///
    /// The original stays untouched for whichever project state still
    /// references it.
    pub fn fork(&mut self, id: ResourceId) -> Result<Fork<'_>, ResourceError> {
        let copy = self.get(id)?.clone();
        let (new_id, instance) = self.insert_fresh(copy)?;
        tracing::debug!(from = %id, to = %new_id, "resource forked");
        Ok(Fork {
            id: new_id,
            instance,
        })
    }

    /// Mark ids as captured by a checkpoint.
    pub fn freeze<'a>(&mut self, ids: impl IntoIterator<Item = &'a ResourceId>) {
        for id in ids {
            if self.resources.contains_key(id) {
                self.frozen.insert(*id);
            }
        }
    }

    /// Whether `id` has been captured by a checkpoint.
    pub fn is_frozen(&self, id: ResourceId) -> bool {
        self.frozen.contains(&id)
    }

    /// Remove every resource whose id is not in `live`. Returns how many were removed.
    pub fn collect(&mut self, live: &BTreeSet<ResourceId>) -> usize {
        let _span = tracing::debug_span!("resource_collect").entered();
        let before = self.resources.len();
        self.resources.retain(|id, _| live.contains(id));
        self.frozen.retain(|id| live.contains(id));
        let removed = before - self.resources.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.resources.len(), "collected resources");
        }
        removed
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All stored ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.keys().copied()
    }

    /// Drop every resource. The id allocator keeps counting.
    pub fn clear(&mut self) {
        self.resources.clear();
        self.frozen.clear();
    }

    fn allocate(&mut self) -> Result<ResourceId, ResourceError> {
        let id = ResourceId(self.next_id);
        if id > ResourceId::MAX {
            tracing::warn!("resource id space exhausted");
            return Err(ResourceError::IdSpaceExhausted);
        }
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(ResourceError::IdSpaceExhausted)?;
        Ok(id)
    }

    /// Store `surface` under a new id. Never hands back an existing resource.
    fn insert_fresh(
        &mut self,
        surface: Surface,
    ) -> Result<(ResourceId, &mut Surface), ResourceError> {
        let id = self.allocate()?;
        match self.resources.entry(id) {
            Entry::Vacant(slot) => Ok((id, slot.insert(surface))),
            Entry::Occupied(_) => Err(ResourceError::IdInUse(id)),
        }
    }
}
