//! Append-only arena storage handing out owner scoped indices
//!
//! Every [`Store`] carries an owner id and an epoch. An [`Index`] records both, so a store can
//! reject indices that were issued by a different store, or by itself before the last
//! [`Store::clear`].
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use thiserror::Error;

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of the store that issued an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Draw a new owner id, distinct from every id drawn before in this process
    pub fn fresh() -> Self {
        OwnerId(NEXT_OWNER_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Handle to an entity living in a [`Store`]
pub struct Index<T> {
    owner: OwnerId,
    epoch: u32,
    slot: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Index<T> {
    /// Position of the entity in its store
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Store that issued this index
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Look the index's slot up in a table kept parallel to the issuing store
    pub fn lookup<'a, U>(&self, table: &'a [U]) -> Result<&'a U, StoreError> {
        table.get(self.slot).ok_or(StoreError::OutOfRange {
            slot: self.slot,
            len: table.len(),
        })
    }
}

// Manual impls so that no bounds are placed on T
impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.epoch == other.epoch && self.slot == other.slot
    }
}

impl<T> Eq for Index<T> {}

impl<T> Hash for Index<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.epoch.hash(state);
        self.slot.hash(state);
    }
}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.owner, self.epoch, self.slot).cmp(&(other.owner, other.epoch, other.slot))
    }
}

impl<T> Debug for Index<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Index({}:{}#{})", self.owner.0, self.epoch, self.slot)
    }
}

/// Owning, append-only collection of entities
///
/// A cloned store keeps the owner id of its source, so indices issued by the source stay valid
/// for the clone. Clones that grow independently share that owner id: an index added to one
/// after the clone is not rejected by the other and resolves to whatever sits in its slot there.
/// Only pass indices to a clone that were issued before it was made.
#[derive(Debug, Clone)]
pub struct Store<T> {
    owner: OwnerId,
    epoch: u32,
    items: Vec<T>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> {
    /// Create a new empty store with a fresh owner id
    pub fn new() -> Self {
        Store {
            owner: OwnerId::fresh(),
            epoch: 0,
            items: Vec::new(),
        }
    }

    /// Owner id stamped into every index this store issues
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Append an entity and return its index
    pub fn add(&mut self, item: T) -> Index<T> {
        let index = self.index_for_slot(self.items.len());
        self.items.push(item);
        index
    }

    /// Append an entity built from the index it is about to receive
    pub fn add_with<F>(&mut self, build: F) -> Index<T>
    where
        F: FnOnce(Index<T>) -> T,
    {
        let index = self.index_for_slot(self.items.len());
        self.items.push(build(index));
        index
    }

    /// Fetch the entity behind an index
    ///
    /// # Returns
    /// The entity, or an error if the index was issued by another store, before the last
    /// clear, or points past the end of the store
    pub fn get(&self, index: Index<T>) -> Result<&T, StoreError> {
        self.validate(index)?;
        Ok(&self.items[index.slot])
    }

    /// Mutable access to the entity behind an index, see [`Store::get`]
    pub fn get_mut(&mut self, index: Index<T>) -> Result<&mut T, StoreError> {
        self.validate(index)?;
        Ok(&mut self.items[index.slot])
    }

    /// Whether the index was issued by this store in its current epoch and is in range
    pub fn contains(&self, index: Index<T>) -> bool {
        self.validate(index).is_ok()
    }

    /// Index of the entity at a given slot
    pub fn index_at(&self, slot: usize) -> Result<Index<T>, StoreError> {
        if slot >= self.items.len() {
            return Err(StoreError::OutOfRange {
                slot,
                len: self.items.len(),
            });
        }
        Ok(self.index_for_slot(slot))
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no entity has been added since creation or the last clear
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored entities in insertion order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Mutable iterator over all stored entities
    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// All currently valid indices in insertion order
    pub fn indices(&self) -> Vec<Index<T>> {
        (0..self.items.len())
            .map(|slot| self.index_for_slot(slot))
            .collect()
    }

    /// Iterate over `(index, entity)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Index<T>, &T)> {
        let owner = self.owner;
        let epoch = self.epoch;
        self.items.iter().enumerate().map(move |(slot, item)| {
            (
                Index {
                    owner,
                    epoch,
                    slot,
                    marker: PhantomData,
                },
                item,
            )
        })
    }

    /// Drop every entity, all previously issued indices become stale
    pub fn clear(&mut self) {
        self.items.clear();
        self.epoch += 1;
    }

    fn index_for_slot(&self, slot: usize) -> Index<T> {
        Index {
            owner: self.owner,
            epoch: self.epoch,
            slot,
            marker: PhantomData,
        }
    }

    fn validate(&self, index: Index<T>) -> Result<(), StoreError> {
        if index.owner != self.owner {
            return Err(StoreError::OwnerMismatch);
        }
        if index.epoch != self.epoch {
            return Err(StoreError::StaleIndex);
        }
        if index.slot >= self.items.len() {
            return Err(StoreError::OutOfRange {
                slot: index.slot,
                len: self.items.len(),
            });
        }
        Ok(())
    }
}

/// Errors associated with accessing a Store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Error when using an index issued by another store
    #[error("Tried to use an index issued by a different owner")]
    OwnerMismatch,
    /// Error when using an index issued before the store was cleared
    #[error("Tried to use an index issued before the store was cleared")]
    StaleIndex,
    /// Error when the index points past the end of the store
    #[error("Index {slot} is out of range for a collection of size {len}")]
    OutOfRange { slot: usize, len: usize },
}
