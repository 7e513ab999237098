use thiserror::Error;

use crate::{
    entity::EntityRef, identifier::IdentifierError, identifier_pool::PoolError,
    sorted_registry::SortedRegistryError,
};

/// Errors that can occur during EntityRegistry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The reference names no live entity: an unknown key, or the handle of
    /// an entity that was shut down. Nothing was mutated.
    #[error("Invalid entity reference: {reference} does not name a live entity")]
    InvalidReference { reference: EntityRef },

    /// Identifier allocation failed
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The ordered store refused an insert. Only reachable if pool and store disagree.
    #[error(transparent)]
    Storage(#[from] SortedRegistryError),

    /// A key string could not be parsed
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

impl RegistryError {
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, RegistryError::Pool(PoolError::PoolExhausted { .. }))
    }
}
