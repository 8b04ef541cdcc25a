//! Capability storage.
//!
//! One generic [`ReferenceStore`] per reference kind, each a sharded map from
//! owning slot to that slot's entries in insertion order. The store knows
//! nothing about namespace lifetimes; callers serialize membership changes
//! through the namespace locks.

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{RegistryError, RegistryResult},
    types::{Capability, CapabilityKind, DataStore, ResourceReference, SlotId, ToolReference},
};

/// A descriptor owned by one namespace and keyed uniquely within it.
pub trait Reference: Clone + Send + Sync + 'static {
    const KIND: CapabilityKind;

    fn namespace_id(&self) -> SlotId;

    /// Uniqueness key within the owning namespace.
    fn key(&self) -> &str;

    fn into_capability(self) -> Capability;
}

impl Reference for ToolReference {
    const KIND: CapabilityKind = CapabilityKind::Tool;

    fn namespace_id(&self) -> SlotId {
        self.namespace_id
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn into_capability(self) -> Capability {
        Capability::Tool(self)
    }
}

impl Reference for ResourceReference {
    const KIND: CapabilityKind = CapabilityKind::Resource;

    fn namespace_id(&self) -> SlotId {
        self.namespace_id
    }

    fn key(&self) -> &str {
        &self.uri
    }

    fn into_capability(self) -> Capability {
        Capability::Resource(self)
    }
}

impl Reference for DataStore {
    const KIND: CapabilityKind = CapabilityKind::DataStore;

    fn namespace_id(&self) -> SlotId {
        self.namespace_id
    }

    fn key(&self) -> &str {
        &self.id
    }

    fn into_capability(self) -> Capability {
        Capability::DataStore(self)
    }
}

pub struct ReferenceStore<T: Reference> {
    entries: DashMap<SlotId, Vec<T>>,
}

impl<T: Reference> Default for ReferenceStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reference> ReferenceStore<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Append a reference to its namespace. Fails with `Conflict` if the key
    /// is already taken there.
    pub fn add(&self, reference: T) -> RegistryResult<T> {
        let namespace = reference.namespace_id();
        let mut bucket = self.entries.entry(namespace).or_default();
        if bucket.iter().any(|existing| existing.key() == reference.key()) {
            return Err(RegistryError::Conflict {
                kind: T::KIND,
                namespace,
                key: reference.key().to_string(),
            });
        }
        bucket.push(reference.clone());
        Ok(reference)
    }

    /// Replace an existing reference in place, keeping its position.
    pub fn update(&self, reference: T) -> RegistryResult<T> {
        let namespace = reference.namespace_id();
        let not_found = || self.not_found(namespace, reference.key());
        let mut bucket = self.entries.get_mut(&namespace).ok_or_else(not_found)?;
        let slot = bucket
            .iter_mut()
            .find(|existing| existing.key() == reference.key())
            .ok_or_else(not_found)?;
        *slot = reference.clone();
        Ok(reference)
    }

    pub fn get(&self, namespace: SlotId, key: &str) -> RegistryResult<T> {
        self.entries
            .get(&namespace)
            .and_then(|bucket| bucket.iter().find(|r| r.key() == key).cloned())
            .ok_or_else(|| self.not_found(namespace, key))
    }

    /// Entries of one namespace, or of every namespace in slot order.
    pub fn list(&self, filter: Option<SlotId>) -> Vec<T> {
        if let Some(namespace) = filter {
            return self.list_namespace(namespace);
        }
        let mut buckets: Vec<(SlotId, Vec<T>)> = self
            .entries
            .iter()
            .map(|bucket| (*bucket.key(), bucket.value().clone()))
            .collect();
        buckets.sort_by_key(|(namespace, _)| *namespace);
        buckets.into_iter().flat_map(|(_, refs)| refs).collect()
    }

    pub fn list_namespace(&self, namespace: SlotId) -> Vec<T> {
        self.entries
            .get(&namespace)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default()
    }

    /// Remove one reference. Absent keys are reported, never ignored.
    pub fn remove(&self, namespace: SlotId, key: &str) -> RegistryResult<T> {
        let removed = {
            let mut bucket = self
                .entries
                .get_mut(&namespace)
                .ok_or_else(|| self.not_found(namespace, key))?;
            let position = bucket
                .iter()
                .position(|r| r.key() == key)
                .ok_or_else(|| self.not_found(namespace, key))?;
            bucket.value_mut().remove(position)
        };
        self.entries.remove_if(&namespace, |_, bucket| bucket.is_empty());
        Ok(removed)
    }

    /// Remove every reference of `namespace` matching `predicate`, keeping the
    /// relative order of the rest.
    pub fn remove_where(
        &self,
        namespace: SlotId,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> Vec<T> {
        let removed = match self.entries.get_mut(&namespace) {
            Some(mut bucket) => {
                let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(bucket.value_mut())
                    .into_iter()
                    .partition(|r| predicate(r));
                *bucket = kept;
                removed
            }
            None => Vec::new(),
        };
        self.entries.remove_if(&namespace, |_, bucket| bucket.is_empty());
        removed
    }

    /// Drop every reference owned by `namespace`, returning how many were removed.
    pub(crate) fn remove_all_for_namespace(&self, namespace: SlotId) -> usize {
        let removed = self
            .entries
            .remove(&namespace)
            .map_or(0, |(_, bucket)| bucket.len());
        debug!(slot = %namespace, kind = %T::KIND, removed, "Cleared namespace entries");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn not_found(&self, namespace: SlotId, key: &str) -> RegistryError {
        RegistryError::NotFound {
            kind: T::KIND,
            namespace,
            key: key.to_string(),
        }
    }
}

/// Per-kind entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityCounts {
    pub tools: usize,
    pub resources: usize,
    pub data_stores: usize,
}

impl CapabilityCounts {
    pub fn total(&self) -> usize {
        self.tools + self.resources + self.data_stores
    }
}

/// The three reference stores side by side.
#[derive(Default)]
pub struct CapabilityStore {
    tools: ReferenceStore<ToolReference>,
    resources: ReferenceStore<ResourceReference>,
    data_stores: ReferenceStore<DataStore>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tools(&self) -> &ReferenceStore<ToolReference> {
        &self.tools
    }

    pub fn resources(&self) -> &ReferenceStore<ResourceReference> {
        &self.resources
    }

    pub fn data_stores(&self) -> &ReferenceStore<DataStore> {
        &self.data_stores
    }

    /// Entries of one namespace across all kinds: tools, resources, then data stores.
    pub fn capabilities_of(&self, namespace: SlotId) -> Vec<Capability> {
        let tools = self.tools.list_namespace(namespace);
        let resources = self.resources.list_namespace(namespace);
        let data_stores = self.data_stores.list_namespace(namespace);
        tools
            .into_iter()
            .map(Reference::into_capability)
            .chain(resources.into_iter().map(Reference::into_capability))
            .chain(data_stores.into_iter().map(Reference::into_capability))
            .collect()
    }

    pub(crate) fn remove_all_for_namespace(&self, namespace: SlotId) -> CapabilityCounts {
        CapabilityCounts {
            tools: self.tools.remove_all_for_namespace(namespace),
            resources: self.resources.remove_all_for_namespace(namespace),
            data_stores: self.data_stores.remove_all_for_namespace(namespace),
        }
    }

    pub fn counts(&self) -> CapabilityCounts {
        CapabilityCounts {
            tools: self.tools.len(),
            resources: self.resources.len(),
            data_stores: self.data_stores.len(),
        }
    }
}
