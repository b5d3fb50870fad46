//! Id-issuing map with a LIFO free list.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A container that assigns stable integer ids to inserted values.
///
/// Released ids are pushed onto a free list and handed out again (most
/// recently released first) before any new id is allocated. An id is never
/// bound to two live values at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SavedFreeList<T>")]
pub struct FreeListMap<T> {
    values: Vec<Option<T>>,
    free_ids: Vec<usize>,
}

/// Saved state that does not describe a valid [`FreeListMap`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FreeListError {
    #[error("free id {0} is out of range")]
    OutOfRange(usize),

    #[error("free id {0} refers to a live value")]
    LiveSlot(usize),

    #[error("free id {0} is listed twice")]
    Duplicate(usize),

    #[error("{empty} empty slots but {free} free ids")]
    Unlisted { empty: usize, free: usize },
}

/// Unchecked form of [`FreeListMap`] as read from storage.
#[derive(Deserialize)]
struct SavedFreeList<T> {
    values: Vec<Option<T>>,
    free_ids: Vec<usize>,
}

impl<T> TryFrom<SavedFreeList<T>> for FreeListMap<T> {
    type Error = FreeListError;

    fn try_from(saved: SavedFreeList<T>) -> Result<Self, Self::Error> {
        let mut listed = vec![false; saved.values.len()];
        for &id in &saved.free_ids {
            match saved.values.get(id) {
                None => return Err(FreeListError::OutOfRange(id)),
                Some(Some(_)) => return Err(FreeListError::LiveSlot(id)),
                Some(None) if listed[id] => return Err(FreeListError::Duplicate(id)),
                Some(None) => listed[id] = true,
            }
        }

        let empty = saved.values.iter().filter(|v| v.is_none()).count();
        if empty != saved.free_ids.len() {
            return Err(FreeListError::Unlisted {
                empty,
                free: saved.free_ids.len(),
            });
        }

        Ok(Self {
            values: saved.values,
            free_ids: saved.free_ids,
        })
    }
}

impl<T> FreeListMap<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            free_ids: Vec::new(),
        }
    }

    /// Store `value` and return its id.
    pub fn insert(&mut self, value: T) -> usize {
        if let Some(id) = self.free_ids.pop() {
            self.values[id] = Some(value);
            return id;
        }

        self.values.push(Some(value));
        self.values.len() - 1
    }

    /// Release `id`, returning the value it held.
    ///
    /// Releasing an id that was never issued or is already free is a caller
    /// bug; it trips a debug assertion and otherwise returns `None`.
    pub fn remove(&mut self, id: usize) -> Option<T> {
        let taken = self.values.get_mut(id).and_then(Option::take);
        debug_assert!(
            taken.is_some(),
            "FreeListMap::remove on unissued or released id {id}"
        );

        if taken.is_some() {
            self.free_ids.push(id);
        }
        taken
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.values.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.values.get_mut(id).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.values.len() - self.free_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The id the next insert would allocate if the free list were empty.
    pub fn next_id(&self) -> usize {
        self.values.len()
    }

    /// Iterate live `(id, value)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|v| (id, v)))
    }

    /// Drop every value and forget all issued ids.
    pub fn clear(&mut self) {
        self.values.clear();
        self.free_ids.clear();
    }
}

impl<T> Default for FreeListMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
