use std::default::Default;

use crate::identifier::IdentifierShape;

/// Contains Config properties which will be used by an EntityRegistry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Letter and digit counts of every identifier the registry hands out.
    /// Determines the size of the identifier universe, which is materialized
    /// when the registry is built.
    pub shape: IdentifierShape,
    /// Seed for the one-time shuffle of the identifier universe. `None` seeds
    /// from the environment; `Some` makes allocation order reproducible.
    pub shuffle_seed: Option<u64>,
}

impl RegistryConfig {
    pub fn with_shape(shape: IdentifierShape) -> Self {
        Self {
            shape,
            ..Self::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            shape: IdentifierShape::default(),
            shuffle_seed: None,
        }
    }
}
