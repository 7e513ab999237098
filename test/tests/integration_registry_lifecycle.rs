/// Integration tests for the registry lifecycle
/// Walks the concrete scenarios end to end on a 260-identifier universe
/// (1 letter + 1 digit), with logging enabled so failures show the trail.

use std::{
    collections::HashSet,
    panic::{catch_unwind, AssertUnwindSafe},
};

use log::info;
use roster::{
    EntityRef, Identifier, IdentifierPool, IdentifierShape, Keyed, PoolError, RegistryError,
    SortedRegistry,
};
use roster_test::{assert_registry_consistent, TestRegistryBuilder};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_shape() -> IdentifierShape {
    IdentifierShape::new(1, 1).unwrap()
}

#[test]
fn acquiring_the_whole_universe_then_one_more() {
    init_logging();
    let shape = small_shape();
    let mut pool = IdentifierPool::with_seed(shape, 7);

    let acquired: HashSet<Identifier> = (0..260).map(|_| pool.acquire().unwrap()).collect();

    assert_eq!(acquired.len(), 260);
    assert!(acquired.iter().all(|identifier| shape.matches(identifier)));
    assert_eq!(
        pool.acquire(),
        Err(PoolError::PoolExhausted { universe_size: 260 })
    );
}

#[test]
fn release_then_acquire_gives_a_different_identifier() {
    init_logging();
    let mut pool = IdentifierPool::with_seed(small_shape(), 7);

    let released = pool.acquire().unwrap();
    pool.release(released.clone());

    assert_ne!(pool.acquire().unwrap(), released);
}

#[test]
fn release_into_otherwise_empty_pool_comes_straight_back() {
    init_logging();
    let mut pool = IdentifierPool::with_seed(small_shape(), 7);
    let all: Vec<Identifier> = (0..260).map(|_| pool.acquire().unwrap()).collect();

    pool.release(all[0].clone());

    assert_eq!(pool.acquire().unwrap(), all[0]);
}

#[test]
fn reset_many_keeps_identities_with_disjoint_keys() {
    init_logging();
    let mut registry = TestRegistryBuilder::new().prefill(5).build();
    let before: Vec<(roster::EntityHandle, Identifier)> = registry
        .iter()
        .map(|entity| (entity.handle(), entity.identifier().clone()))
        .collect();
    let handles: Vec<_> = before.iter().map(|(handle, _)| *handle).collect();
    let original: HashSet<Identifier> = before.into_iter().map(|(_, key)| key).collect();

    let reset = registry.reset_many(handles.clone()).unwrap();
    info!("reset {} entities", reset.len());

    assert_eq!(reset, handles);
    let fresh: HashSet<Identifier> = reset
        .iter()
        .map(|handle| registry.entity(*handle).unwrap().identifier().clone())
        .collect();
    assert_eq!(fresh.len(), 5);
    assert!(original.is_disjoint(&fresh));
    assert_registry_consistent!(registry);
}

#[test]
fn shutdown_of_absent_key_is_a_no_op() {
    init_logging();
    let mut registry = TestRegistryBuilder::new().prefill(4).build();
    let absent: Identifier = "ZZ9".parse().unwrap();
    let count = registry.count();

    assert!(registry.shutdown(&absent).is_none());
    assert_eq!(registry.count(), count);
    assert_registry_consistent!(registry);
}

#[test]
fn reset_of_unknown_reference_fails_without_mutation() {
    init_logging();
    let mut registry = TestRegistryBuilder::new().prefill(4).build();
    let keys_before: Vec<Identifier> = registry.iter().map(|e| e.identifier().clone()).collect();
    let available_before = registry.available_identifiers();

    let bogus: Identifier = "42".parse().unwrap();
    let result = registry.reset_one(&bogus);

    assert_eq!(
        result,
        Err(RegistryError::InvalidReference {
            reference: EntityRef::ByKey(bogus)
        })
    );
    let keys_after: Vec<Identifier> = registry.iter().map(|e| e.identifier().clone()).collect();
    assert_eq!(keys_after, keys_before);
    assert_eq!(registry.available_identifiers(), available_before);
}

#[test]
fn malformed_key_text_never_reaches_the_registry() {
    init_logging();
    let shape = small_shape();

    assert!("forty-two".parse::<Identifier>().is_err());
    assert!(shape.parse("AB12").is_err());
}

#[derive(Debug, Clone)]
struct Slot {
    key: u32,
}

impl Keyed for Slot {
    type Key = u32;

    fn key(&self) -> &u32 {
        &self.key
    }
}

#[test]
fn failed_batch_mutation_is_resorted_before_the_failure_surfaces() {
    init_logging();
    let mut store = SortedRegistry::new();
    store
        .insert_batch([10, 20, 30, 40].into_iter().map(|key| Slot { key }))
        .unwrap();

    // mutate A, fail before B
    let result = catch_unwind(AssertUnwindSafe(|| {
        store.batch_mutate(|slots| {
            slots[0].key = 35;
            panic!("failure between the two key changes");
        })
    }));

    assert!(result.is_err());
    let keys: Vec<u32> = store.iter().map(|slot| slot.key).collect();
    assert_eq!(keys, vec![20, 30, 35, 40]);
    assert!(store.is_sorted());
}

#[test]
fn failed_single_mutation_restores_partial_state() {
    init_logging();
    let mut store = SortedRegistry::new();
    store
        .insert_batch([10, 20, 30].into_iter().map(|key| Slot { key }))
        .unwrap();

    let outcome = store.mutate_one(&10u32, |slot| {
        slot.key = 25;
        Err::<(), String>("stopped after changing the key".to_string())
    });

    assert_eq!(
        outcome,
        Some(Err("stopped after changing the key".to_string()))
    );
    let keys: Vec<u32> = store.iter().map(|slot| slot.key).collect();
    assert_eq!(keys, vec![20, 25, 30]);
}

#[test]
fn full_lifecycle_on_default_shape() {
    init_logging();
    let mut registry = TestRegistryBuilder::new().shape(2, 3).seed(99).build();

    let handles = registry.create_many(1_000).unwrap();
    registry.reset_many(handles[..250].to_vec()).unwrap();
    for handle in &handles[250..300] {
        registry.reset_one(*handle).unwrap();
    }
    for handle in &handles[300..400] {
        registry.shutdown_ref(*handle).unwrap();
    }
    info!(
        "{} live entities, {} identifiers available",
        registry.count(),
        registry.available_identifiers()
    );

    assert_eq!(registry.count(), 900);
    assert_eq!(registry.available_identifiers(), 676_000 - 900);
    assert_registry_consistent!(registry);
}
