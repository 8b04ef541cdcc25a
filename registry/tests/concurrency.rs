//! Races between namespace lifecycle and capability registration.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier,
    },
    thread,
};

use capability_registry::{
    BackendConfig, CapabilityRegistry, DataStore, ErrorKind, LabelSelector, RegistryError,
    RegistryResult, SlotId, ToolReference,
};

/// Removal racing a cascade delete either wins or finds nothing left.
fn assert_removed_or_gone<T>(result: RegistryResult<T>, round: usize) {
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::NotFound, "round {round}: unexpected error {e}");
    }
}

#[test]
fn test_parallel_creates_fill_each_slot_once() {
    let registry = CapabilityRegistry::default();
    let barrier = Barrier::new(16);
    let quota_hits = AtomicUsize::new(0);

    let created: Vec<SlotId> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = &registry;
                let barrier = &barrier;
                let quota_hits = &quota_hits;
                s.spawn(move || {
                    barrier.wait();
                    match registry.create_namespace(format!("worker {i}"), "") {
                        Ok(ns) => Some(ns.slot_id),
                        Err(e) => {
                            assert_eq!(e.kind(), ErrorKind::QuotaExceeded);
                            quota_hits.fetch_add(1, Ordering::Relaxed);
                            None
                        }
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<SlotId> = created.iter().copied().collect();
    assert_eq!(created.len(), 10);
    assert_eq!(unique.len(), 10);
    assert_eq!(quota_hits.load(Ordering::Relaxed), 6);
    assert_eq!(registry.list_namespaces().len(), 11);
}

#[test]
fn test_delete_and_expose_never_leave_orphans() {
    for round in 0..50 {
        let registry = CapabilityRegistry::default();
        let slot = registry.create_namespace("contested", "").unwrap().slot_id;
        let barrier = Barrier::new(5);

        thread::scope(|s| {
            for worker in 0..4 {
                let registry = &registry;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    for n in 0..25 {
                        let tool = ToolReference::new(slot, format!("tool-{worker}-{n}"));
                        match registry.expose_tool(tool) {
                            Ok(_) => {}
                            Err(RegistryError::NamespaceNotFound(missing)) => {
                                assert_eq!(missing, slot);
                                break;
                            }
                            Err(other) => panic!("round {round}: unexpected error {other}"),
                        }
                    }
                });
            }
            s.spawn(|| {
                barrier.wait();
                registry.delete_namespace(slot).unwrap();
            });
        });

        assert!(registry.get_namespace(slot).is_err());
        assert!(
            registry.list_tools(None).is_empty(),
            "round {round}: tools survived their namespace"
        );
        assert_eq!(registry.stats().tools, 0);
    }
}

#[test]
fn test_concurrent_deletes_succeed_once() {
    let registry = CapabilityRegistry::default();
    let slot = registry.create_namespace("once", "").unwrap().slot_id;
    let barrier = Barrier::new(8);
    let successes = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                barrier.wait();
                match registry.delete_namespace(slot) {
                    Ok(_) => {
                        successes.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => assert_eq!(e.kind(), ErrorKind::NotFound),
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::Relaxed), 1);
    assert_eq!(registry.stats().occupied_slots, 0);
}

#[test]
fn test_readers_see_whole_namespaces() {
    let registry = CapabilityRegistry::default();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();
            for _ in 0..100 {
                let slot = registry.create_namespace("churn", "").unwrap().slot_id;
                for n in 0..5 {
                    registry
                        .expose_tool(ToolReference::new(slot, format!("t{n}")))
                        .unwrap();
                }
                registry.delete_namespace(slot).unwrap();
            }
        });
        s.spawn(|| {
            barrier.wait();
            for _ in 0..500 {
                // A namespace is read under its shared lock, so a listing
                // sees either all of a namespace's tools so far or none.
                let listed = registry.list_capabilities(None);
                assert!(listed.len() <= 5);
                for capability in listed {
                    assert_eq!(capability.namespace_id(), SlotId::Numbered(0));
                }
            }
        });
    });

    assert!(registry.list_capabilities(None).is_empty());
}

#[test]
fn test_delete_and_remove_race() {
    for round in 0..50 {
        let registry = CapabilityRegistry::default();
        let slot = registry.create_namespace("contested", "").unwrap().slot_id;
        for n in 0..20 {
            registry
                .expose_tool(ToolReference::new(slot, format!("tool-{n}")))
                .unwrap();
            registry
                .register_data_store(DataStore::new(
                    slot,
                    format!("store-{n}"),
                    BackendConfig::new("memory", serde_json::json!({})),
                ))
                .unwrap();
        }
        let barrier = Barrier::new(5);
        let removed = AtomicUsize::new(0);

        thread::scope(|s| {
            for worker in 0..4 {
                let registry = &registry;
                let barrier = &barrier;
                let removed = &removed;
                s.spawn(move || {
                    barrier.wait();
                    for n in (worker..20).step_by(4) {
                        let tool = registry.remove_tool(slot, &format!("tool-{n}"));
                        let store = registry.remove_data_store(slot, &format!("store-{n}"));
                        removed.fetch_add(
                            usize::from(tool.is_ok()) + usize::from(store.is_ok()),
                            Ordering::Relaxed,
                        );
                        assert_removed_or_gone(tool, round);
                        assert_removed_or_gone(store, round);
                    }
                });
            }
            s.spawn(|| {
                barrier.wait();
                let deleted = registry.delete_namespace(slot).unwrap();
                removed.fetch_add(deleted.removed.total(), Ordering::Relaxed);
            });
        });

        // Every entry was removed exactly once, by a worker or by the cascade.
        assert_eq!(removed.load(Ordering::Relaxed), 40, "round {round}");
        let stats = registry.stats();
        assert_eq!((stats.tools, stats.data_stores), (0, 0), "round {round}");
        assert!(registry.list_capabilities(None).is_empty());
    }
}

#[test]
fn test_bulk_label_removal_races_delete() {
    let selector = LabelSelector::parse("labelExpression", "env=prod").unwrap();
    for round in 0..50 {
        let registry = CapabilityRegistry::default();
        let slot = registry.create_namespace("contested", "").unwrap().slot_id;
        for n in 0..10 {
            registry
                .expose_tool(ToolReference::new(slot, format!("tool-{n}")).with_label("env", "prod"))
                .unwrap();
        }
        let barrier = Barrier::new(2);

        let (bulk, cascade) = thread::scope(|s| {
            let bulk = s.spawn(|| {
                barrier.wait();
                registry.remove_tools_matching(None, &selector)
            });
            let cascade = s.spawn(|| {
                barrier.wait();
                registry.delete_namespace(slot).unwrap().removed.tools
            });
            (bulk.join().unwrap(), cascade.join().unwrap())
        });

        // The namespace lock hands the tools wholly to one side.
        assert!(
            (bulk, cascade) == (10, 0) || (bulk, cascade) == (0, 10),
            "round {round}: bulk removed {bulk}, cascade removed {cascade}"
        );
        assert_eq!(registry.stats().tools, 0);
    }
}
