//! # Roster
//! An in-memory entity registry: a pre-shuffled pool of fixed-shape unique
//! identifiers, a sorted store searched by bisection, and an orchestrator that
//! creates, resets and shuts down entities without ever letting two of them
//! share a key or leaving the store out of order.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod entity;
mod entity_registry;
mod error;
mod identifier;
mod identifier_pool;
mod registry_config;
mod sorted_registry;

pub use entity::{Entity, EntityHandle, EntityRef};
pub use entity_registry::EntityRegistry;
pub use error::RegistryError;
pub use identifier::{Identifier, IdentifierError, IdentifierShape, Sequences, MAX_UNIVERSE_SIZE};
pub use identifier_pool::{IdentifierPool, PoolError};
pub use registry_config::RegistryConfig;
pub use sorted_registry::{Keyed, SortedRegistry, SortedRegistryError};
