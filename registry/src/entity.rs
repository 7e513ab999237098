use std::fmt;

use crate::{identifier::Identifier, sorted_registry::Keyed};

// EntityHandle

/// Stable reference to one registry entity. Survives resets, never reused
/// within a registry, and grants no mutation rights on its own.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug)]
pub struct EntityHandle(u64);

impl EntityHandle {
    pub(crate) fn from_u64(value: u64) -> Self {
        EntityHandle(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// Entity

/// A registry-owned record keyed by an `Identifier`.
///
/// The key can only be changed by the registry that owns the entity, which is
/// what keeps the registry sorted and the identifier pool consistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity<P = ()> {
    handle: EntityHandle,
    identifier: Identifier,
    payload: P,
}

impl<P> Entity<P> {
    pub(crate) fn new(handle: EntityHandle, identifier: Identifier, payload: P) -> Self {
        Self {
            handle,
            identifier,
            payload,
        }
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    /// Swaps in a new key and hands back the old one.
    pub(crate) fn reassign(&mut self, identifier: Identifier) -> Identifier {
        std::mem::replace(&mut self.identifier, identifier)
    }
}

impl<P> Keyed for Entity<P> {
    type Key = Identifier;

    fn key(&self) -> &Identifier {
        &self.identifier
    }
}

// EntityRef

/// Either way of naming an entity when asking the registry to act on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
    ByHandle(EntityHandle),
    ByKey(Identifier),
}

impl From<EntityHandle> for EntityRef {
    fn from(handle: EntityHandle) -> Self {
        EntityRef::ByHandle(handle)
    }
}

impl From<Identifier> for EntityRef {
    fn from(identifier: Identifier) -> Self {
        EntityRef::ByKey(identifier)
    }
}

impl From<&Identifier> for EntityRef {
    fn from(identifier: &Identifier) -> Self {
        EntityRef::ByKey(identifier.clone())
    }
}

impl<P> From<&Entity<P>> for EntityRef {
    fn from(entity: &Entity<P>) -> Self {
        EntityRef::ByHandle(entity.handle())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::ByHandle(handle) => write!(f, "handle {}", handle),
            EntityRef::ByKey(identifier) => write!(f, "key {}", identifier),
        }
    }
}
