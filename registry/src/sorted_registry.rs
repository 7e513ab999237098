use std::{borrow::Borrow, cmp::Ordering, slice::SliceIndex};

use log::{debug, warn};
use thiserror::Error;

/// Errors that can occur during SortedRegistry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortedRegistryError {
    /// An item with an equal key is already stored. The rejected item is dropped.
    #[error("Duplicate key not allowed in SortedRegistry: already stored at index {index}")]
    DuplicateKey { index: usize },

    /// A batch repeats a key, or contains a key already stored.
    /// Nothing from the batch is inserted.
    #[error("Batch of {batch_len} items contains a duplicated or already stored key")]
    BatchConflict { batch_len: usize },
}

/// Items stored in a `SortedRegistry` expose the field they are ordered by.
pub trait Keyed {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// A vector kept in ascending key order, searched by bisection.
///
/// Point inserts and deletes cost O(log n) to locate plus O(n) to shift.
/// Groups of inserts or key changes should go through `insert_batch` or
/// `batch_mutate`, which pay for a single sort instead of one shift per item.
pub struct SortedRegistry<T: Keyed> {
    items: Vec<T>,
}

impl<T: Keyed> SortedRegistry<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    // Lookup

    pub fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.items
            .binary_search_by(|item| <T::Key as Borrow<Q>>::borrow(item.key()).cmp(key))
            .ok()
    }

    pub fn find<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.position(key).map(|index| &self.items[index])
    }

    /// Bisects with a caller-supplied comparator, which must agree with key order.
    pub fn find_by<F>(&self, compare: F) -> Option<&T>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.items
            .binary_search_by(compare)
            .ok()
            .map(|index| &self.items[index])
    }

    // Point mutation

    /// Inserts before the first item whose key is greater, returning the index used.
    pub fn insert(&mut self, item: T) -> Result<usize, SortedRegistryError> {
        let index = upper_bound(&self.items, item.key());
        if index > 0 && self.items[index - 1].key() == item.key() {
            return Err(SortedRegistryError::DuplicateKey { index: index - 1 });
        }
        self.items.insert(index, item);
        Ok(index)
    }

    /// Removes the item with `key`. A missing key is not an error.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let index = self.position(key)?;
        Some(self.items.remove(index))
    }

    /// Takes the item with `key` out of the sequence, lets `mutation` change it,
    /// then puts it back at the position its (new) key calls for.
    ///
    /// The item is put back even if `mutation` panics, carrying whatever state
    /// it had reached. A fallible mutation reports through `R`, which the caller
    /// receives only after the item has been restored.
    /// Returns `None` without calling `mutation` when `key` is not stored.
    pub fn mutate_one<Q, R, F>(&mut self, key: &Q, mutation: F) -> Option<R>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnOnce(&mut T) -> R,
    {
        let index = self.position(key)?;
        let item = self.items.remove(index);

        let mut guard = Reinsert {
            items: &mut self.items,
            item: Some(item),
        };
        let output = guard.item.as_mut().map(mutation);
        drop(guard);

        output
    }

    // Batch mutation

    /// Inserts every item with one sort. Items may arrive in any order.
    ///
    /// The batch is validated before storage is touched: if it repeats a key,
    /// or carries a key that is already stored, nothing is inserted.
    pub fn insert_batch<I>(&mut self, items: I) -> Result<usize, SortedRegistryError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut incoming: Vec<T> = items.into_iter().collect();
        let batch_len = incoming.len();
        if batch_len == 0 {
            return Ok(0);
        }

        sort_by_key(&mut incoming);
        let repeats = incoming
            .windows(2)
            .any(|pair| pair[0].key() == pair[1].key());
        if repeats || incoming.iter().any(|item| self.position(item.key()).is_some()) {
            return Err(SortedRegistryError::BatchConflict { batch_len });
        }

        self.items.append(&mut incoming);
        sort_by_key(&mut self.items);
        debug!("SortedRegistry inserted batch of {} items", batch_len);
        Ok(batch_len)
    }

    /// Runs `mutation` over the stored items with ordering suspended, then
    /// sorts once.
    ///
    /// The sort runs on every exit path: normal return, an `Err` carried in
    /// `R`, or a panic inside `mutation`. The slice cannot grow or shrink, so
    /// only keys and payloads change inside the scope. Bisecting lookups are
    /// not meaningful until the scope ends; resolve positions before entering.
    pub fn batch_mutate<R, F>(&mut self, mutation: F) -> R
    where
        F: FnOnce(&mut [T]) -> R,
    {
        let mut guard = Resort {
            items: &mut self.items,
        };
        let output = mutation(guard.items.as_mut_slice());
        drop(guard);

        output
    }

    // Read-only views

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    // callers must not change the key
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn slice<I>(&self, range: I) -> Option<&[T]>
    where
        I: SliceIndex<[T], Output = [T]>,
    {
        self.items.get(range)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Whether keys are in non-decreasing order.
    pub fn is_sorted(&self) -> bool {
        self.items
            .windows(2)
            .all(|pair| pair[0].key() <= pair[1].key())
    }
}

impl<T: Keyed + Clone> SortedRegistry<T> {
    /// Snapshot copy of the stored items, in key order.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}

impl<T: Keyed> Default for SortedRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Keyed> IntoIterator for &'a SortedRegistry<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// first index whose key is greater than `key`
fn upper_bound<T: Keyed>(items: &[T], key: &T::Key) -> usize {
    items.partition_point(|stored| stored.key() <= key)
}

fn sort_by_key<T: Keyed>(items: &mut [T]) {
    items.sort_by(|a, b| a.key().cmp(b.key()));
}

// Puts a removed item back in order when dropped, including during unwind.
struct Reinsert<'a, T: Keyed> {
    items: &'a mut Vec<T>,
    item: Option<T>,
}

impl<T: Keyed> Drop for Reinsert<'_, T> {
    fn drop(&mut self) {
        let Some(item) = self.item.take() else {
            return;
        };
        let index = upper_bound(self.items.as_slice(), item.key());
        if index > 0 && self.items[index - 1].key() == item.key() {
            warn!(
                "SortedRegistry mutation produced a key already stored at index {}; keeping both",
                index - 1
            );
        }
        self.items.insert(index, item);
    }
}

// Restores key order when dropped, including during unwind.
struct Resort<'a, T: Keyed> {
    items: &'a mut Vec<T>,
}

impl<T: Keyed> Drop for Resort<'_, T> {
    fn drop(&mut self) {
        sort_by_key(self.items.as_mut_slice());
        let duplicates = self
            .items
            .windows(2)
            .filter(|pair| pair[0].key() == pair[1].key())
            .count();
        if duplicates > 0 {
            warn!(
                "SortedRegistry batch mutation left {} duplicated keys",
                duplicates
            );
        }
        debug!("SortedRegistry re-sorted {} items after batch mutation", self.items.len());
    }
}
