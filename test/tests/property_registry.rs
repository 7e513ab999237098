/// PROPERTY-BASED TESTS: Registry invariants
///
/// Uses proptest to drive registries through random operation sequences.
///
/// Key invariants:
/// 1. Keys stay sorted and unique after every operation
/// 2. available + live == universe at every step
/// 3. A fresh key is never one that a live entity holds
/// 4. Batch and sequential creation end with the same keys
/// 5. Released keys come back only after everything queued ahead of them

use std::collections::HashSet;

use proptest::prelude::*;
use roster::{EntityHandle, Identifier, IdentifierPool, IdentifierShape};
use roster_test::{assert_registry_consistent, assert_same_keys, check_registry_invariants, TestRegistryBuilder};

#[derive(Debug, Clone)]
enum Operation {
    CreateOne,
    CreateMany(usize),
    ResetOne(usize),
    ResetMany(Vec<usize>),
    Shutdown(usize),
    ShutdownMissing,
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => Just(Operation::CreateOne),
        2 => (0usize..40).prop_map(Operation::CreateMany),
        3 => any::<usize>().prop_map(Operation::ResetOne),
        2 => prop::collection::vec(any::<usize>(), 0..8).prop_map(Operation::ResetMany),
        2 => any::<usize>().prop_map(Operation::Shutdown),
        1 => Just(Operation::ShutdownMissing),
    ]
}

fn pick(handles: &[EntityHandle], index: usize) -> Option<EntityHandle> {
    if handles.is_empty() {
        None
    } else {
        Some(handles[index % handles.len()])
    }
}

proptest! {
    /// Every operation sequence leaves the registry consistent
    #[test]
    fn prop_operations_preserve_invariants(
        seed in any::<u64>(),
        operations in prop::collection::vec(operation_strategy(), 1..60),
    ) {
        let mut registry = TestRegistryBuilder::new().seed(seed).build();
        let mut live: Vec<EntityHandle> = Vec::new();

        for operation in operations {
            match operation {
                Operation::CreateOne => {
                    if let Ok(handle) = registry.create_one() {
                        live.push(handle);
                    } else {
                        prop_assert_eq!(registry.available_identifiers(), 0);
                    }
                }
                Operation::CreateMany(count) => {
                    let available = registry.available_identifiers();
                    match registry.create_many(count) {
                        Ok(handles) => live.extend(handles),
                        Err(error) => {
                            prop_assert!(error.is_pool_exhausted());
                            prop_assert!(count > available);
                        }
                    }
                }
                Operation::ResetOne(index) => {
                    if let Some(handle) = pick(&live, index) {
                        prop_assert_eq!(registry.reset_one(handle), Ok(handle));
                    }
                }
                Operation::ResetMany(indices) => {
                    let targets: Vec<EntityHandle> =
                        indices.iter().filter_map(|index| pick(&live, *index)).collect();
                    prop_assert_eq!(registry.reset_many(targets.clone()), Ok(targets));
                }
                Operation::Shutdown(index) => {
                    if let Some(handle) = pick(&live, index) {
                        let key = registry.entity(handle).unwrap().identifier().clone();
                        let removed = registry.shutdown(&key);
                        prop_assert_eq!(removed.map(|entity| entity.handle()), Some(handle));
                        live.retain(|live_handle| *live_handle != handle);
                    }
                }
                Operation::ShutdownMissing => {
                    let count = registry.count();
                    prop_assert!(registry.shutdown("A").is_none());
                    prop_assert_eq!(registry.count(), count);
                }
            }

            prop_assert_eq!(registry.count(), live.len());
            if let Err(reason) = check_registry_invariants(&registry) {
                return Err(TestCaseError::fail(reason));
            }
        }
    }

    /// A reset entity never receives a key another live entity holds
    #[test]
    fn prop_reset_keys_are_fresh(
        seed in any::<u64>(),
        prefill in 1usize..200,
        resets in prop::collection::vec(any::<usize>(), 1..30),
    ) {
        let mut registry = TestRegistryBuilder::new().seed(seed).prefill(prefill).build();
        let handles: Vec<EntityHandle> = registry.iter().map(|entity| entity.handle()).collect();

        for index in resets {
            let handle = handles[index % handles.len()];
            let others: HashSet<Identifier> = registry
                .iter()
                .filter(|entity| entity.handle() != handle)
                .map(|entity| entity.identifier().clone())
                .collect();

            registry.reset_one(handle).unwrap();

            let fresh = registry.entity(handle).unwrap().identifier();
            prop_assert!(!others.contains(fresh));
        }
        assert_registry_consistent!(registry);
    }

    /// create_many(n) and n x create_one() end with the same sorted keys
    #[test]
    fn prop_batch_and_sequential_creation_agree(
        seed in any::<u64>(),
        count in 0usize..260,
    ) {
        let mut batched = TestRegistryBuilder::new().seed(seed).build();
        let mut sequential = TestRegistryBuilder::new().seed(seed).build();

        batched.create_many(count).unwrap();
        for _ in 0..count {
            sequential.create_one().unwrap();
        }

        assert_same_keys!(batched, sequential);
    }

    /// A released identifier is reused only after everything ahead of it
    #[test]
    fn prop_release_is_fifo(
        seed in any::<u64>(),
        taken in 1usize..50,
    ) {
        let shape = IdentifierShape::new(1, 1).unwrap();
        let mut pool = IdentifierPool::with_seed(shape, seed);

        let held: Vec<Identifier> = (0..taken).map(|_| pool.acquire().unwrap()).collect();
        let ahead = pool.available_len();
        for identifier in held.iter().rev() {
            pool.release(identifier.clone());
        }

        for _ in 0..ahead {
            let next = pool.acquire().unwrap();
            prop_assert!(!held.contains(&next));
        }
        let reused: Vec<Identifier> = (0..taken).map(|_| pool.acquire().unwrap()).collect();
        let expected: Vec<Identifier> = held.into_iter().rev().collect();
        prop_assert_eq!(reused, expected);
    }
}
