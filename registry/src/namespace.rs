//! Namespace slot management.
//!
//! Slots live in a fixed table of `max_slots` entries plus the default slot,
//! which is provisioned at construction and can never be deleted.
//!
//! Locking:
//! - The slot table mutex is held only while a slot is selected or released.
//! - Each namespace carries its own membership lock. Writers (capability
//!   add/remove, cascade delete) hold it exclusively, readers share it.
//! - The table lock is always taken before a membership lock and never while
//!   one is held.
//!
//! A deleted namespace is marked retired while its membership lock is still
//! held, at which point its slot counts as free. The table entry itself is
//! cleared afterwards.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    config::RegistryConfig,
    error::{ConfigError, RegistryError, RegistryResult},
    types::{Namespace, SlotId},
};

struct NamespaceCell {
    namespace: Namespace,
    membership: RwLock<()>,
    retired: AtomicBool,
}

impl NamespaceCell {
    fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            membership: RwLock::new(()),
            retired: AtomicBool::new(false),
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }
}

pub struct NamespaceManager {
    slots: Mutex<Box<[Option<Arc<NamespaceCell>>]>>,
    default: Arc<NamespaceCell>,
    max_slots: usize,
}

impl NamespaceManager {
    pub fn new(config: &RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Build from a config that already passed [`RegistryConfig::validate`].
    pub(crate) fn from_validated(config: &RegistryConfig) -> Self {
        let default = Namespace {
            slot_id: SlotId::Default,
            display_name: config.default_namespace.display_name.clone(),
            description: config.default_namespace.description.clone(),
            created_at: Utc::now(),
        };
        Self {
            slots: Mutex::new(vec![None; config.max_slots].into_boxed_slice()),
            default: Arc::new(NamespaceCell::new(default)),
            max_slots: config.max_slots,
        }
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Allocate the lowest free numbered slot.
    pub fn create_namespace(
        &self,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> RegistryResult<Namespace> {
        let mut table = self.slots.lock();
        let index = table
            .iter()
            .position(|slot| slot.as_ref().map_or(true, |cell| cell.is_retired()))
            .ok_or(RegistryError::QuotaExceeded {
                limit: self.max_slots,
            })?;

        let namespace = Namespace {
            slot_id: SlotId::numbered(index),
            display_name: display_name.into(),
            description: description.into(),
            created_at: Utc::now(),
        };
        table[index] = Some(Arc::new(NamespaceCell::new(namespace.clone())));
        drop(table);

        info!(slot = %namespace.slot_id, name = %namespace.display_name, "Namespace created");
        Ok(namespace)
    }

    /// Live namespaces ordered by slot id, `default` last.
    pub fn list_namespaces(&self) -> Vec<Namespace> {
        self.live_cells(None)
            .into_iter()
            .map(|cell| cell.namespace.clone())
            .collect()
    }

    pub fn get_namespace(&self, slot: SlotId) -> RegistryResult<Namespace> {
        self.live_cell(slot)
            .map(|cell| cell.namespace.clone())
            .ok_or(RegistryError::NamespaceNotFound(slot))
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.live_cell(slot).is_some()
    }

    /// Number of occupied numbered slots.
    pub fn occupied(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .flatten()
            .filter(|cell| !cell.is_retired())
            .count()
    }

    /// Delete a numbered namespace.
    ///
    /// `cascade` runs under the namespace's exclusive lock and must remove
    /// everything the namespace owns. Its result is handed back to the caller.
    pub fn delete_namespace<R>(
        &self,
        slot: SlotId,
        cascade: impl FnOnce(SlotId) -> R,
    ) -> RegistryResult<(Namespace, R)> {
        let index = match slot.index() {
            Some(index) => index,
            None => {
                return Err(RegistryError::Forbidden(
                    "the default namespace cannot be deleted".to_string(),
                ))
            }
        };
        let cell = self
            .live_cell(slot)
            .ok_or(RegistryError::NamespaceNotFound(slot))?;

        let outcome = {
            let _members = cell.membership.write();
            // A concurrent delete may have won the race for the lock.
            if cell.is_retired() {
                return Err(RegistryError::NamespaceNotFound(slot));
            }
            let outcome = cascade(slot);
            cell.retired.store(true, Ordering::Release);
            outcome
        };

        let mut table = self.slots.lock();
        if matches!(&table[index], Some(current) if Arc::ptr_eq(current, &cell)) {
            table[index] = None;
        }
        drop(table);

        info!(slot = %slot, "Namespace deleted");
        Ok((cell.namespace.clone(), outcome))
    }

    /// Run `f` while holding the namespace's membership lock exclusively.
    ///
    /// Fails with `NamespaceNotFound` if the namespace does not exist or is
    /// deleted before the lock is acquired.
    pub fn with_exclusive<R>(
        &self,
        slot: SlotId,
        f: impl FnOnce(&Namespace) -> RegistryResult<R>,
    ) -> RegistryResult<R> {
        let cell = self
            .live_cell(slot)
            .ok_or(RegistryError::NamespaceNotFound(slot))?;
        let _members = cell.membership.write();
        if cell.is_retired() {
            return Err(RegistryError::NamespaceNotFound(slot));
        }
        f(&cell.namespace)
    }

    /// Run `f` while holding the namespace's membership lock shared.
    pub fn with_shared<R>(
        &self,
        slot: SlotId,
        f: impl FnOnce(&Namespace) -> RegistryResult<R>,
    ) -> RegistryResult<R> {
        let cell = self
            .live_cell(slot)
            .ok_or(RegistryError::NamespaceNotFound(slot))?;
        let _members = cell.membership.read();
        if cell.is_retired() {
            return Err(RegistryError::NamespaceNotFound(slot));
        }
        f(&cell.namespace)
    }

    /// Run `f` serialized against membership changes of `slot` if that
    /// namespace exists, or unlocked if it does not. Never fails on its own.
    pub fn with_membership_lock<R>(&self, slot: SlotId, f: impl FnOnce() -> R) -> R {
        match self.cell(slot) {
            Some(cell) => {
                let _members = cell.membership.write();
                f()
            }
            None => f(),
        }
    }

    /// Visit live namespaces in listing order, each under its shared lock.
    ///
    /// With `filter` set only that namespace is visited. The default
    /// namespace is skipped in unfiltered walks unless `include_default`.
    pub fn read_each(
        &self,
        filter: Option<SlotId>,
        include_default: bool,
        mut visit: impl FnMut(&Namespace),
    ) {
        for cell in self.live_cells(filter) {
            if filter.is_none() && cell.namespace.slot_id.is_default() && !include_default {
                continue;
            }
            let _members = cell.membership.read();
            if cell.is_retired() {
                debug!(slot = %cell.namespace.slot_id, "Skipping namespace deleted mid-read");
                continue;
            }
            visit(&cell.namespace);
        }
    }

    /// Visit live namespaces like [`read_each`](Self::read_each), each under
    /// its exclusive lock.
    pub fn write_each(
        &self,
        filter: Option<SlotId>,
        include_default: bool,
        mut visit: impl FnMut(&Namespace),
    ) {
        for cell in self.live_cells(filter) {
            if filter.is_none() && cell.namespace.slot_id.is_default() && !include_default {
                continue;
            }
            let _members = cell.membership.write();
            if cell.is_retired() {
                debug!(slot = %cell.namespace.slot_id, "Skipping namespace deleted mid-write");
                continue;
            }
            visit(&cell.namespace);
        }
    }

    fn cell(&self, slot: SlotId) -> Option<Arc<NamespaceCell>> {
        match slot.index() {
            None => Some(Arc::clone(&self.default)),
            Some(index) => self.slots.lock().get(index).cloned().flatten(),
        }
    }

    fn live_cell(&self, slot: SlotId) -> Option<Arc<NamespaceCell>> {
        self.cell(slot).filter(|cell| !cell.is_retired())
    }

    fn live_cells(&self, filter: Option<SlotId>) -> Vec<Arc<NamespaceCell>> {
        if let Some(slot) = filter {
            return self.live_cell(slot).into_iter().collect();
        }
        let mut cells: Vec<Arc<NamespaceCell>> = self
            .slots
            .lock()
            .iter()
            .flatten()
            .filter(|cell| !cell.is_retired())
            .cloned()
            .collect();
        cells.push(Arc::clone(&self.default));
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUMBERED_SLOT_LIMIT;

    fn manager() -> NamespaceManager {
        NamespaceManager::new(&RegistryConfig::default()).unwrap()
    }

    #[test]
    fn test_default_namespace_always_present() {
        let manager = manager();
        let listed = manager.list_namespaces();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].slot_id, SlotId::Default);
        assert_eq!(listed[0].display_name, "Default");
        assert!(manager.contains(SlotId::Default));
    }

    #[test]
    fn test_lowest_free_slot_allocation() {
        let manager = manager();
        let first = manager.create_namespace("first", "").unwrap();
        let second = manager.create_namespace("second", "").unwrap();
        assert_eq!(first.slot_id, SlotId::Numbered(0));
        assert_eq!(second.slot_id, SlotId::Numbered(1));

        manager.delete_namespace(first.slot_id, |_| ()).unwrap();
        let third = manager.create_namespace("third", "").unwrap();
        assert_eq!(third.slot_id, SlotId::Numbered(0));
        assert_eq!(third.display_name, "third");
    }

    #[test]
    fn test_quota_excludes_default() {
        let manager = manager();
        for i in 0..10 {
            let ns = manager.create_namespace(format!("ns {i}"), "").unwrap();
            assert_eq!(ns.slot_id, SlotId::Numbered(i));
        }
        for _ in 0..3 {
            assert_eq!(
                manager.create_namespace("overflow", "").unwrap_err(),
                RegistryError::QuotaExceeded { limit: 10 }
            );
        }
        assert_eq!(manager.occupied(), 10);
        assert_eq!(manager.list_namespaces().len(), 11);
    }

    #[test]
    fn test_configured_slot_count() {
        let config = RegistryConfig {
            max_slots: 2,
            ..Default::default()
        };
        let manager = NamespaceManager::new(&config).unwrap();
        manager.create_namespace("a", "").unwrap();
        manager.create_namespace("b", "").unwrap();
        assert_eq!(
            manager.create_namespace("c", "").unwrap_err(),
            RegistryError::QuotaExceeded { limit: 2 }
        );
        assert!(matches!(
            manager.get_namespace(SlotId::Numbered(5)),
            Err(RegistryError::NamespaceNotFound(_))
        ));
    }

    #[test]
    fn test_listing_order_is_stable() {
        let manager = manager();
        for name in ["a", "b", "c", "d"] {
            manager.create_namespace(name, "").unwrap();
        }
        manager.delete_namespace(SlotId::Numbered(1), |_| ()).unwrap();

        let ids: Vec<String> = manager
            .list_namespaces()
            .iter()
            .map(|ns| ns.slot_id.to_string())
            .collect();
        assert_eq!(ids, vec!["ns-0", "ns-2", "ns-3", "default"]);
        assert_eq!(
            manager.list_namespaces(),
            manager.list_namespaces(),
            "listing must be stable across calls"
        );
    }

    #[test]
    fn test_delete_errors() {
        let manager = manager();
        assert!(matches!(
            manager.delete_namespace(SlotId::Default, |_| ()),
            Err(RegistryError::Forbidden(_))
        ));
        assert_eq!(
            manager
                .delete_namespace(SlotId::Numbered(4), |_| ())
                .unwrap_err(),
            RegistryError::NamespaceNotFound(SlotId::Numbered(4))
        );

        let ns = manager.create_namespace("once", "").unwrap();
        manager.delete_namespace(ns.slot_id, |_| ()).unwrap();
        assert_eq!(
            manager.delete_namespace(ns.slot_id, |_| ()).unwrap_err(),
            RegistryError::NamespaceNotFound(ns.slot_id)
        );
    }

    #[test]
    fn test_cascade_runs_under_lock_and_returns_outcome() {
        let manager = manager();
        let ns = manager.create_namespace("tools", "").unwrap();
        let (deleted, removed) = manager
            .delete_namespace(ns.slot_id, |slot| {
                assert_eq!(slot, ns.slot_id);
                7usize
            })
            .unwrap();
        assert_eq!(deleted.display_name, "tools");
        assert_eq!(removed, 7);
        assert!(!manager.contains(ns.slot_id));
    }

    #[test]
    fn test_with_exclusive_rejects_missing_namespace() {
        let manager = manager();
        let result = manager.with_exclusive(SlotId::Numbered(0), |_| Ok(()));
        assert_eq!(
            result.unwrap_err(),
            RegistryError::NamespaceNotFound(SlotId::Numbered(0))
        );
        assert!(manager.with_exclusive(SlotId::Default, |_| Ok(())).is_ok());
        assert_eq!(manager.with_membership_lock(SlotId::Numbered(3), || 42), 42);
    }

    #[test]
    fn test_read_each_default_inclusion() {
        let manager = manager();
        manager.create_namespace("a", "").unwrap();

        let mut seen = Vec::new();
        manager.read_each(None, false, |ns| seen.push(ns.slot_id));
        assert_eq!(seen, vec![SlotId::Numbered(0)]);

        seen.clear();
        manager.read_each(None, true, |ns| seen.push(ns.slot_id));
        assert_eq!(seen, vec![SlotId::Numbered(0), SlotId::Default]);

        seen.clear();
        manager.read_each(Some(SlotId::Default), false, |ns| seen.push(ns.slot_id));
        assert_eq!(seen, vec![SlotId::Default]);
    }

    #[test]
    fn test_new_rejects_slot_counts_beyond_id_space() {
        for max_slots in [0, NUMBERED_SLOT_LIMIT + 1, 300] {
            let config = RegistryConfig {
                max_slots,
                ..Default::default()
            };
            assert!(
                matches!(
                    NamespaceManager::new(&config),
                    Err(ConfigError::Invalid { field: "max_slots", .. })
                ),
                "max_slots {max_slots} should be rejected"
            );
        }
    }

    #[test]
    fn test_write_each_skips_deleted_and_default() {
        let manager = manager();
        for name in ["a", "b", "c"] {
            manager.create_namespace(name, "").unwrap();
        }
        manager.delete_namespace(SlotId::Numbered(1), |_| ()).unwrap();

        let mut seen = Vec::new();
        manager.write_each(None, false, |ns| seen.push(ns.slot_id));
        assert_eq!(seen, vec![SlotId::Numbered(0), SlotId::Numbered(2)]);

        seen.clear();
        manager.write_each(None, true, |ns| seen.push(ns.slot_id));
        assert_eq!(seen.last(), Some(&SlotId::Default));

        seen.clear();
        manager.write_each(Some(SlotId::Numbered(1)), true, |ns| seen.push(ns.slot_id));
        assert!(seen.is_empty());
    }
}
