use std::collections::VecDeque;

use log::{debug, warn};
use thiserror::Error;

use crate::identifier::{Identifier, IdentifierError, IdentifierShape};

/// Errors that can occur during IdentifierPool operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every identifier in the universe is currently in use.
    /// Releasing an identifier makes the pool usable again.
    #[error("All {universe_size} identifiers are in use")]
    PoolExhausted { universe_size: u64 },

    /// The requested shape cannot back a pool
    #[error(transparent)]
    Shape(#[from] IdentifierError),
}

/// A pre-shuffled queue of every identifier of one shape.
///
/// Construction materializes and shuffles the whole universe once, so that
/// `acquire` and `release` are O(1) afterwards. Released identifiers go to
/// the back of the queue and are only handed out again after everything
/// queued ahead of them.
pub struct IdentifierPool {
    shape: IdentifierShape,
    available: VecDeque<Identifier>,
}

impl IdentifierPool {
    /// Builds a pool shuffled with a randomly seeded generator.
    pub fn new(shape: IdentifierShape) -> Self {
        Self::populate(shape, &fastrand::Rng::new())
    }

    /// Builds a pool whose shuffle order is fully determined by `seed`.
    pub fn with_seed(shape: IdentifierShape, seed: u64) -> Self {
        Self::populate(shape, &fastrand::Rng::with_seed(seed))
    }

    /// Convenience constructor validating the letter/digit counts first.
    pub fn try_new(letter_count: u32, digit_count: u32) -> Result<Self, PoolError> {
        Ok(Self::new(IdentifierShape::new(letter_count, digit_count)?))
    }

    fn populate(shape: IdentifierShape, rng: &fastrand::Rng) -> Self {
        let mut identifiers: Vec<Identifier> = shape.sequences().collect();
        rng.shuffle(&mut identifiers);
        debug!(
            "IdentifierPool populated with {} identifiers ({} letters + {} digits)",
            identifiers.len(),
            shape.letter_count(),
            shape.digit_count()
        );

        Self {
            shape,
            available: VecDeque::from(identifiers),
        }
    }

    /// Takes the identifier at the front of the queue.
    pub fn acquire(&mut self) -> Result<Identifier, PoolError> {
        self.available.pop_front().ok_or(PoolError::PoolExhausted {
            universe_size: self.shape.universe_size(),
        })
    }

    /// Queues `identifier` for reuse behind every identifier already available.
    ///
    /// Membership in the universe is not checked: callers only release what
    /// they acquired.
    pub fn release(&mut self, identifier: Identifier) {
        if !self.shape.matches(&identifier) {
            warn!(
                "Releasing identifier {} which does not match the pool shape",
                identifier
            );
        }
        self.available.push_back(identifier);
    }

    pub fn shape(&self) -> IdentifierShape {
        self.shape
    }

    pub fn universe_size(&self) -> u64 {
        self.shape.universe_size()
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    /// Identifiers currently handed out, assuming only acquired identifiers are released.
    pub fn in_use_len(&self) -> u64 {
        self.universe_size()
            .saturating_sub(self.available.len() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// Available identifiers in the order `acquire` will return them.
    pub fn available(&self) -> impl ExactSizeIterator<Item = &Identifier> + '_ {
        self.available.iter()
    }
}
