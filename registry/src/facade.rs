//! Registry entry point.
//!
//! [`CapabilityRegistry`] composes the namespace manager, the capability store
//! and the validator. Every mutation runs validation first, then commits under
//! the owning namespace's exclusive lock, so a failure at any stage leaves
//! nothing behind.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::RegistryConfig,
    error::{ConfigError, RegistryError, RegistryResult},
    labels::LabelSelector,
    namespace::NamespaceManager,
    store::{CapabilityCounts, CapabilityStore, Reference, ReferenceStore},
    types::{Capability, DataStore, Namespace, ResourceReference, SlotId, ToolReference},
    validate::ReferenceValidator,
};

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub occupied_slots: usize,
    pub free_slots: usize,
    pub tools: usize,
    pub resources: usize,
    pub data_stores: usize,
}

/// Summary of a cascade delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNamespace {
    pub namespace: Namespace,
    pub removed: CapabilityCounts,
}

pub struct CapabilityRegistry {
    config: RegistryConfig,
    namespaces: NamespaceManager,
    store: CapabilityStore,
    validator: ReferenceValidator,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::build(RegistryConfig::default())
    }
}

impl CapabilityRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RegistryConfig) -> Self {
        info!(
            max_slots = config.max_slots,
            include_default_in_unfiltered = config.include_default_in_unfiltered,
            "Initializing capability registry"
        );
        Self {
            namespaces: NamespaceManager::from_validated(&config),
            store: CapabilityStore::new(),
            validator: ReferenceValidator::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ========================================================================
    // Namespaces
    // ========================================================================

    pub fn list_namespaces(&self) -> Vec<Namespace> {
        self.namespaces.list_namespaces()
    }

    pub fn create_namespace(
        &self,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> RegistryResult<Namespace> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(RegistryError::validation("displayName", "must not be empty"));
        }
        self.namespaces
            .create_namespace(display_name, description)
            .inspect_err(|e| warn!(error = %e, "Namespace creation rejected"))
    }

    pub fn get_namespace(&self, slot: SlotId) -> RegistryResult<Namespace> {
        self.namespaces.get_namespace(slot)
    }

    /// Delete a namespace and everything it owns.
    pub fn delete_namespace(&self, slot: SlotId) -> RegistryResult<DeletedNamespace> {
        let (namespace, removed) = self
            .namespaces
            .delete_namespace(slot, |slot| self.store.remove_all_for_namespace(slot))
            .inspect_err(|e| warn!(slot = %slot, error = %e, "Namespace deletion rejected"))?;
        info!(
            slot = %slot,
            tools = removed.tools,
            resources = removed.resources,
            data_stores = removed.data_stores,
            "Cascade delete complete"
        );
        Ok(DeletedNamespace { namespace, removed })
    }

    // ========================================================================
    // Tools
    // ========================================================================

    pub fn expose_tool(&self, tool: ToolReference) -> RegistryResult<ToolReference> {
        self.validator.validate_tool(&tool).inspect_err(|e| {
            warn!(slot = %tool.namespace_id, name = %tool.name, error = %e, "Tool rejected")
        })?;
        self.admit(self.store.tools(), tool)
    }

    /// Replace an exposed tool, keeping its listing position.
    pub fn update_tool(&self, tool: ToolReference) -> RegistryResult<ToolReference> {
        self.validator.validate_tool(&tool).inspect_err(|e| {
            warn!(slot = %tool.namespace_id, name = %tool.name, error = %e, "Tool rejected")
        })?;
        self.replace(self.store.tools(), tool)
    }

    pub fn list_tools(&self, filter: Option<SlotId>) -> Vec<ToolReference> {
        self.collect(self.store.tools(), filter)
    }

    pub fn list_tools_matching(
        &self,
        filter: Option<SlotId>,
        selector: &LabelSelector,
    ) -> Vec<ToolReference> {
        self.collect_where(self.store.tools(), filter, |t| selector.selects(t))
    }

    /// Remove every tool whose labels match `selector`, returning how many went.
    pub fn remove_tools_matching(
        &self,
        filter: Option<SlotId>,
        selector: &LabelSelector,
    ) -> usize {
        self.withdraw_where(self.store.tools(), filter, |t| selector.selects(t))
    }

    pub fn get_tool(&self, namespace: SlotId, name: &str) -> RegistryResult<ToolReference> {
        self.lookup(self.store.tools(), namespace, name)
    }

    pub fn remove_tool(&self, namespace: SlotId, name: &str) -> RegistryResult<ToolReference> {
        self.withdraw(self.store.tools(), namespace, name)
    }

    // ========================================================================
    // Resources
    // ========================================================================

    pub fn expose_resource(
        &self,
        resource: ResourceReference,
    ) -> RegistryResult<ResourceReference> {
        self.validator.validate_resource(&resource).inspect_err(|e| {
            warn!(slot = %resource.namespace_id, uri = %resource.uri, error = %e, "Resource rejected")
        })?;
        self.admit(self.store.resources(), resource)
    }

    pub fn list_resources(&self, filter: Option<SlotId>) -> Vec<ResourceReference> {
        self.collect(self.store.resources(), filter)
    }

    pub fn get_resource(&self, namespace: SlotId, uri: &str) -> RegistryResult<ResourceReference> {
        self.lookup(self.store.resources(), namespace, uri)
    }

    pub fn remove_resource(
        &self,
        namespace: SlotId,
        uri: &str,
    ) -> RegistryResult<ResourceReference> {
        self.withdraw(self.store.resources(), namespace, uri)
    }

    // ========================================================================
    // Data stores
    // ========================================================================

    pub fn register_data_store(&self, data_store: DataStore) -> RegistryResult<DataStore> {
        self.check_data_store(&data_store)?;
        self.admit(self.store.data_stores(), data_store)
    }

    /// Replace a registered data store, keeping its listing position.
    pub fn update_data_store(&self, data_store: DataStore) -> RegistryResult<DataStore> {
        self.check_data_store(&data_store)?;
        self.replace(self.store.data_stores(), data_store)
    }

    pub fn list_data_stores(&self, filter: Option<SlotId>) -> Vec<DataStore> {
        self.collect(self.store.data_stores(), filter)
    }

    pub fn list_data_stores_matching(
        &self,
        filter: Option<SlotId>,
        selector: &LabelSelector,
    ) -> Vec<DataStore> {
        self.collect_where(self.store.data_stores(), filter, |d| selector.selects(d))
    }

    pub fn remove_data_stores_matching(
        &self,
        filter: Option<SlotId>,
        selector: &LabelSelector,
    ) -> usize {
        self.withdraw_where(self.store.data_stores(), filter, |d| selector.selects(d))
    }

    /// Data stores whose display name is exactly `name`.
    pub fn find_data_stores_by_name(&self, filter: Option<SlotId>, name: &str) -> Vec<DataStore> {
        self.collect_where(self.store.data_stores(), filter, |d| {
            d.name.as_deref() == Some(name)
        })
    }

    pub fn remove_data_stores_by_name(&self, filter: Option<SlotId>, name: &str) -> usize {
        self.withdraw_where(self.store.data_stores(), filter, |d| {
            d.name.as_deref() == Some(name)
        })
    }

    pub fn get_data_store(&self, namespace: SlotId, id: &str) -> RegistryResult<DataStore> {
        self.lookup(self.store.data_stores(), namespace, id)
    }

    pub fn remove_data_store(&self, namespace: SlotId, id: &str) -> RegistryResult<DataStore> {
        self.withdraw(self.store.data_stores(), namespace, id)
    }

    // ========================================================================
    // Aggregate views
    // ========================================================================

    /// Every capability, tagged by kind, in namespace listing order.
    ///
    /// Recomputed from the stores on each call. Within a namespace tools come
    /// first, then resources, then data stores.
    pub fn list_capabilities(&self, filter: Option<SlotId>) -> Vec<Capability> {
        let mut capabilities = Vec::new();
        self.namespaces
            .read_each(filter, self.config.include_default_in_unfiltered, |ns| {
                capabilities.extend(self.store.capabilities_of(ns.slot_id));
            });
        debug!(filter = ?filter, count = capabilities.len(), "Listed capabilities");
        capabilities
    }

    pub fn stats(&self) -> RegistryStats {
        let occupied = self.namespaces.occupied();
        let counts = self.store.counts();
        RegistryStats {
            occupied_slots: occupied,
            free_slots: self.namespaces.max_slots().saturating_sub(occupied),
            tools: counts.tools,
            resources: counts.resources,
            data_stores: counts.data_stores,
        }
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    fn check_data_store(&self, data_store: &DataStore) -> RegistryResult<()> {
        self.validator
            .validate_data_store(data_store)
            .inspect_err(|e| {
                warn!(slot = %data_store.namespace_id, key = %data_store.id, error = %e, "Data store rejected")
            })
    }

    /// Commit an already validated reference into an existing namespace.
    fn admit<T: Reference>(&self, store: &ReferenceStore<T>, reference: T) -> RegistryResult<T> {
        let slot = reference.namespace_id();
        let key = reference.key().to_string();
        let added = self
            .namespaces
            .with_exclusive(slot, |_| store.add(reference));
        match &added {
            Ok(_) => info!(slot = %slot, kind = %T::KIND, key = %key, "Capability registered"),
            Err(e) => warn!(slot = %slot, kind = %T::KIND, key = %key, error = %e, "Capability rejected"),
        }
        added
    }

    fn replace<T: Reference>(&self, store: &ReferenceStore<T>, reference: T) -> RegistryResult<T> {
        let slot = reference.namespace_id();
        let key = reference.key().to_string();
        let updated = self
            .namespaces
            .with_exclusive(slot, |_| store.update(reference));
        match &updated {
            Ok(_) => info!(slot = %slot, kind = %T::KIND, key = %key, "Capability updated"),
            Err(e) => warn!(slot = %slot, kind = %T::KIND, key = %key, error = %e, "Capability update rejected"),
        }
        updated
    }

    fn withdraw<T: Reference>(
        &self,
        store: &ReferenceStore<T>,
        slot: SlotId,
        key: &str,
    ) -> RegistryResult<T> {
        let removed = self
            .namespaces
            .with_membership_lock(slot, || store.remove(slot, key));
        match &removed {
            Ok(_) => info!(slot = %slot, kind = %T::KIND, key = %key, "Capability removed"),
            Err(e) => debug!(slot = %slot, kind = %T::KIND, key = %key, error = %e, "Nothing to remove"),
        }
        removed
    }

    fn lookup<T: Reference>(
        &self,
        store: &ReferenceStore<T>,
        slot: SlotId,
        key: &str,
    ) -> RegistryResult<T> {
        self.namespaces.with_shared(slot, |_| store.get(slot, key))
    }

    fn collect<T: Reference>(&self, store: &ReferenceStore<T>, filter: Option<SlotId>) -> Vec<T> {
        self.collect_where(store, filter, |_| true)
    }

    fn collect_where<T: Reference>(
        &self,
        store: &ReferenceStore<T>,
        filter: Option<SlotId>,
        mut keep: impl FnMut(&T) -> bool,
    ) -> Vec<T> {
        let mut references = Vec::new();
        self.namespaces
            .read_each(filter, self.config.include_default_in_unfiltered, |ns| {
                references.extend(
                    store
                        .list_namespace(ns.slot_id)
                        .into_iter()
                        .filter(|r| keep(r)),
                );
            });
        debug!(kind = %T::KIND, filter = ?filter, count = references.len(), "Listed references");
        references
    }

    /// Bulk removal over the same namespaces a listing with `filter` visits.
    fn withdraw_where<T: Reference>(
        &self,
        store: &ReferenceStore<T>,
        filter: Option<SlotId>,
        mut matches: impl FnMut(&T) -> bool,
    ) -> usize {
        let mut removed = 0;
        self.namespaces
            .write_each(filter, self.config.include_default_in_unfiltered, |ns| {
                let gone = store.remove_where(ns.slot_id, &mut matches);
                if !gone.is_empty() {
                    info!(slot = %ns.slot_id, kind = %T::KIND, removed = gone.len(), "Capabilities removed");
                }
                removed += gone.len();
            });
        removed
    }
}
