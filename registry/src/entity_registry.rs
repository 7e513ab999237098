use std::{borrow::Borrow, collections::HashMap};

use log::{debug, trace, warn};

use crate::{
    entity::{Entity, EntityHandle, EntityRef},
    error::RegistryError,
    identifier::{Identifier, IdentifierShape},
    identifier_pool::{IdentifierPool, PoolError},
    registry_config::RegistryConfig,
    sorted_registry::{SortedRegistry, SortedRegistryError},
};

/// Creates, resets and retires entities, keeping two things true after every
/// call: entities are sorted by key, and no key is both held and available.
///
/// Every key change happens while the entity is outside the sorted sequence
/// (`mutate_one`) or while ordering is suspended (`batch_mutate`), so a lookup
/// can never observe two entities sharing a key.
pub struct EntityRegistry<P = ()> {
    pool: IdentifierPool,
    entities: SortedRegistry<Entity<P>>,
    handles: HashMap<EntityHandle, Identifier>,
    next_handle: u64,
}

impl<P> EntityRegistry<P> {
    /// Registry over the default 2-letter, 3-digit universe with a random shuffle.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let pool = match config.shuffle_seed {
            Some(seed) => IdentifierPool::with_seed(config.shape, seed),
            None => IdentifierPool::new(config.shape),
        };

        Self {
            pool,
            entities: SortedRegistry::new(),
            handles: HashMap::new(),
            next_handle: 0,
        }
    }

    // Creation

    pub fn create_one_with(&mut self, payload: P) -> Result<EntityHandle, RegistryError> {
        let identifier = self.pool.acquire()?;
        let handle = allocate_handle(&mut self.next_handle);
        trace!("Creating entity {} as {}", handle, identifier);

        self.entities
            .insert(Entity::new(handle, identifier.clone(), payload))?;
        self.handles.insert(handle, identifier);
        Ok(handle)
    }

    /// Creates `count` entities, calling `on_each` on every entity as it is
    /// built, then inserts them all with a single sort.
    ///
    /// Fails with `PoolExhausted` before creating anything if fewer than
    /// `count` identifiers are available. If `on_each` fails, the entities
    /// built so far (the failing one included) are still inserted and the
    /// failure is returned afterwards. A panicking `on_each` leaves them
    /// inserted too.
    pub fn create_many_with<F, E>(
        &mut self,
        count: usize,
        mut on_each: F,
    ) -> Result<Vec<EntityHandle>, E>
    where
        P: Default,
        F: FnMut(&Entity<P>) -> Result<(), E>,
        E: From<RegistryError>,
    {
        if count > self.pool.available_len() {
            return Err(RegistryError::from(self.exhausted()).into());
        }

        let next_handle = &mut self.next_handle;
        let mut batch = PendingBatch {
            pool: &mut self.pool,
            entities: &mut self.entities,
            handles: &mut self.handles,
            built: Vec::with_capacity(count),
        };
        let mut failure = None;
        for _ in 0..count {
            let identifier = batch.pool.acquire().map_err(RegistryError::from)?;
            let index = batch.built.len();
            batch.built.push(Entity::new(
                allocate_handle(next_handle),
                identifier,
                P::default(),
            ));
            if let Err(error) = on_each(&batch.built[index]) {
                failure = Some(error);
                break;
            }
        }

        let handles = batch.commit().map_err(RegistryError::from)?;
        match failure {
            Some(error) => Err(error),
            None => Ok(handles),
        }
    }

    // Reset

    /// Gives the entity a fresh key. Its old key goes to the back of the pool
    /// before the new one is drawn, so a reset never exhausts the pool.
    pub fn reset_one(
        &mut self,
        reference: impl Into<EntityRef>,
    ) -> Result<EntityHandle, RegistryError> {
        let reference = reference.into();
        let key = self.resolve(&reference)?;

        let pool = &mut self.pool;
        let reassigned = self
            .entities
            .mutate_one(&key, |entity| {
                let fresh = Self::reassign(pool, entity)?;
                Ok::<_, PoolError>((entity.handle(), fresh))
            })
            .ok_or(RegistryError::InvalidReference { reference })?;
        let (handle, fresh) = reassigned?;

        trace!("Reset entity {} from {} to {}", handle, key, fresh);
        self.handles.insert(handle, fresh);
        Ok(handle)
    }

    /// Resets every referenced entity inside one batch scope, calling
    /// `on_each` after each reassignment, and sorts once at the end.
    ///
    /// All references are resolved before anything changes; one bad
    /// reference fails the whole call. A reference listed twice is reset
    /// twice. If `on_each` fails, entities already reset keep their new keys,
    /// the sequence is still re-sorted, and the failure is returned.
    pub fn reset_many_with<I, F, E>(
        &mut self,
        references: I,
        mut on_each: F,
    ) -> Result<Vec<EntityHandle>, E>
    where
        I: IntoIterator,
        I::Item: Into<EntityRef>,
        F: FnMut(&Entity<P>) -> Result<(), E>,
        E: From<RegistryError>,
    {
        let mut positions = Vec::new();
        for reference in references {
            let reference = reference.into();
            let key = self.resolve(&reference)?;
            let position = self
                .entities
                .position(&key)
                .ok_or(RegistryError::InvalidReference { reference })?;
            positions.push(position);
        }

        let pool = &mut self.pool;
        let handles = &mut self.handles;
        let outcome = self.entities.batch_mutate(
            |entities: &mut [Entity<P>]| -> Result<Vec<EntityHandle>, E> {
                let mut reset = Vec::with_capacity(positions.len());
                for position in positions {
                    let entity = &mut entities[position];
                    let fresh = Self::reassign(pool, entity).map_err(RegistryError::from)?;
                    handles.insert(entity.handle(), fresh);
                    reset.push(entity.handle());
                    on_each(&*entity)?;
                }
                Ok(reset)
            },
        );

        if let Ok(reset) = &outcome {
            debug!("Reset batch of {} entities", reset.len());
        }
        outcome
    }

    pub fn reset_many<I>(&mut self, references: I) -> Result<Vec<EntityHandle>, RegistryError>
    where
        I: IntoIterator,
        I::Item: Into<EntityRef>,
    {
        self.reset_many_with(references, |_| Ok::<(), RegistryError>(()))
    }

    // release first, then acquire: the pool can never be empty at the acquire
    fn reassign(pool: &mut IdentifierPool, entity: &mut Entity<P>) -> Result<Identifier, PoolError> {
        pool.release(entity.identifier().clone());
        let fresh = pool.acquire()?;
        entity.reassign(fresh.clone());
        Ok(fresh)
    }

    // Shutdown

    /// Removes the entity with `key` and returns its identifier to the pool.
    /// An unknown key is not an error.
    pub fn shutdown<Q>(&mut self, key: &Q) -> Option<Entity<P>>
    where
        Identifier: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let entity = self.entities.delete(key)?;
        self.handles.remove(&entity.handle());
        self.pool.release(entity.identifier().clone());
        trace!("Shut down entity {} ({})", entity.handle(), entity.identifier());
        Some(entity)
    }

    pub fn shutdown_ref(
        &mut self,
        reference: impl Into<EntityRef>,
    ) -> Result<Entity<P>, RegistryError> {
        let reference = reference.into();
        let key = self.resolve(&reference)?;
        self.shutdown(&key)
            .ok_or(RegistryError::InvalidReference { reference })
    }

    // Lookup

    /// Parses `value` as a key of this registry's shape.
    pub fn parse_key(&self, value: &str) -> Result<Identifier, RegistryError> {
        Ok(self.pool.shape().parse(value)?)
    }

    fn resolve(&self, reference: &EntityRef) -> Result<Identifier, RegistryError> {
        let key = match reference {
            EntityRef::ByHandle(handle) => self.handles.get(handle).cloned(),
            EntityRef::ByKey(key) => self
                .entities
                .position(key)
                .map(|_| key.clone()),
        };
        key.ok_or_else(|| RegistryError::InvalidReference {
            reference: reference.clone(),
        })
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&Entity<P>>
    where
        Identifier: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entities.find(key)
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&Entity<P>> {
        let key = self.handles.get(&handle)?;
        self.entities.find(key)
    }

    /// Payloads do not take part in ordering, so they may be changed in place.
    pub fn payload_mut(&mut self, handle: EntityHandle) -> Option<&mut P> {
        let key = self.handles.get(&handle)?;
        let position = self.entities.position(key)?;
        self.entities
            .get_mut(position)
            .map(|entity| entity.payload_mut())
    }

    pub fn contains(&self, reference: impl Into<EntityRef>) -> bool {
        self.resolve(&reference.into()).is_ok()
    }

    // Introspection

    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&Entity<P>> {
        self.entities.at(index)
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> Option<&[Entity<P>]> {
        self.entities.slice(range)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity<P>> {
        self.entities.iter()
    }

    pub fn shape(&self) -> IdentifierShape {
        self.pool.shape()
    }

    pub fn universe_size(&self) -> u64 {
        self.pool.universe_size()
    }

    pub fn available_identifiers(&self) -> usize {
        self.pool.available_len()
    }

    pub fn is_sorted(&self) -> bool {
        self.entities.is_sorted()
    }

    fn exhausted(&self) -> PoolError {
        PoolError::PoolExhausted {
            universe_size: self.pool.universe_size(),
        }
    }
}

impl<P: Default> EntityRegistry<P> {
    pub fn create_one(&mut self) -> Result<EntityHandle, RegistryError> {
        self.create_one_with(P::default())
    }

    pub fn create_many(&mut self, count: usize) -> Result<Vec<EntityHandle>, RegistryError> {
        self.create_many_with(count, |_| Ok::<(), RegistryError>(()))
    }
}

impl<P: Clone> EntityRegistry<P> {
    /// Snapshot copy, in key order. Changing it does not affect the registry.
    pub fn to_list(&self) -> Vec<Entity<P>> {
        self.entities.to_vec()
    }
}

impl<P> Default for EntityRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn allocate_handle(next_handle: &mut u64) -> EntityHandle {
    let handle = EntityHandle::from_u64(*next_handle);
    *next_handle += 1;
    handle
}

// Entities built by `create_many_with` but not yet stored. Stores whatever is
// still pending when dropped, including during unwind.
struct PendingBatch<'a, P> {
    pool: &'a mut IdentifierPool,
    entities: &'a mut SortedRegistry<Entity<P>>,
    handles: &'a mut HashMap<EntityHandle, Identifier>,
    built: Vec<Entity<P>>,
}

impl<P> PendingBatch<'_, P> {
    // on failure the identifiers go back to the pool
    fn commit(&mut self) -> Result<Vec<EntityHandle>, SortedRegistryError> {
        let built = std::mem::take(&mut self.built);
        let index: Vec<(EntityHandle, Identifier)> = built
            .iter()
            .map(|entity| (entity.handle(), entity.identifier().clone()))
            .collect();

        if let Err(error) = self.entities.insert_batch(built) {
            for (_, identifier) in index {
                self.pool.release(identifier);
            }
            return Err(error);
        }

        let handles: Vec<EntityHandle> = index.iter().map(|(handle, _)| *handle).collect();
        self.handles.extend(index);
        debug!("Created batch of {} entities", handles.len());
        Ok(handles)
    }
}

impl<P> Drop for PendingBatch<'_, P> {
    fn drop(&mut self) {
        if self.built.is_empty() {
            return;
        }
        if let Err(error) = self.commit() {
            warn!("Dropped entity batch could not be stored: {}", error);
        }
    }
}
