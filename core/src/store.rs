use std::collections::HashSet;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::models::{
    DEFAULT_START_WEIGHT_KG, GalleryImage, Record, Recipe, RoadbookEntry, START_LABEL,
    WeightEntry,
};
use crate::storage::{KeyValueStorage, StorageError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored value for '{0}'")]
    Missing(&'static str),
    #[error("failed to read '{key}': {source}")]
    Read {
        key: &'static str,
        source: StorageError,
    },
    #[error("stored value for '{key}' does not match its schema: {source}")]
    Decode {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("stored value for '{key}' is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to encode '{key}': {source}")]
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to write '{key}': {source}")]
    Write {
        key: &'static str,
        source: StorageError,
    },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GuardError {
    #[error("The weight log must keep at least one entry")]
    LastElement,
    #[error("No weight entry at index {index} (log has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Outcome of a confirmed delete.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    Removed(WeightEntry),
    Declined,
}

/// A user-visible, non-fatal message about durability.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub key: &'static str,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Maps a record type onto its in-memory slot.
pub trait Stored: Record {
    fn slot(store: &CollectionStore) -> &Vec<Self>;
    fn slot_mut(store: &mut CollectionStore) -> &mut Vec<Self>;
}

impl Stored for WeightEntry {
    fn slot(store: &CollectionStore) -> &Vec<Self> {
        &store.weights
    }
    fn slot_mut(store: &mut CollectionStore) -> &mut Vec<Self> {
        &mut store.weights
    }
}

impl Stored for Recipe {
    fn slot(store: &CollectionStore) -> &Vec<Self> {
        &store.recipes
    }
    fn slot_mut(store: &mut CollectionStore) -> &mut Vec<Self> {
        &mut store.recipes
    }
}

impl Stored for GalleryImage {
    fn slot(store: &CollectionStore) -> &Vec<Self> {
        &store.gallery
    }
    fn slot_mut(store: &mut CollectionStore) -> &mut Vec<Self> {
        &mut store.gallery
    }
}

impl Stored for RoadbookEntry {
    fn slot(store: &CollectionStore) -> &Vec<Self> {
        &store.roadbook
    }
    fn slot_mut(store: &mut CollectionStore) -> &mut Vec<Self> {
        &mut store.roadbook
    }
}

/// Read-through/write-through cache of the four collections over durable storage.
///
/// In-memory state is authoritative for the session. Every mutation is flushed
/// right away; a failed flush leaves memory updated and queues a [`Notice`].
pub struct CollectionStore {
    storage: Box<dyn KeyValueStorage>,
    clock: Box<dyn Clock>,
    weights: Vec<WeightEntry>,
    recipes: Vec<Recipe>,
    gallery: Vec<GalleryImage>,
    roadbook: Vec<RoadbookEntry>,
    notices: Vec<Notice>,
}

impl CollectionStore {
    pub fn open(storage: Box<dyn KeyValueStorage>, clock: Box<dyn Clock>) -> Self {
        Self::open_with_start(storage, clock, DEFAULT_START_WEIGHT_KG)
    }

    /// Like [`open`](Self::open), but a missing weight log is seeded with
    /// `start_kg` instead of the default start weight.
    pub fn open_with_start(
        storage: Box<dyn KeyValueStorage>,
        clock: Box<dyn Clock>,
        start_kg: f64,
    ) -> Self {
        let weights = load_or(storage.as_ref(), || {
            vec![WeightEntry {
                date: START_LABEL.to_string(),
                weight: start_kg,
            }]
        });
        let recipes = load(storage.as_ref());
        let gallery = load(storage.as_ref());
        let roadbook = load(storage.as_ref());
        Self {
            storage,
            clock,
            weights,
            recipes,
            gallery,
            roadbook,
            notices: Vec::new(),
        }
    }

    /// Read a collection straight from durable storage, falling back to its seed.
    #[must_use]
    pub fn load<T: Record>(&self) -> Vec<T> {
        load(self.storage.as_ref())
    }

    #[must_use]
    pub fn items<T: Stored>(&self) -> &[T] {
        T::slot(self)
    }

    pub fn weights(&self) -> &[WeightEntry] {
        &self.weights
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn gallery(&self) -> &[GalleryImage] {
        &self.gallery
    }

    pub fn roadbook(&self) -> &[RoadbookEntry] {
        &self.roadbook
    }

    /// Weight of the newest entry.
    #[must_use]
    pub fn current_weight(&self) -> f64 {
        self.weights
            .last()
            .map_or(DEFAULT_START_WEIGHT_KG, |w| w.weight)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Replace a whole collection, then flush it.
    pub fn replace_all<T: Stored>(&mut self, items: Vec<T>) -> Result<(), GuardError> {
        T::check_collection(&items).map_err(GuardError::Rejected)?;
        *T::slot_mut(self) = items;
        self.persist::<T>();
        Ok(())
    }

    /// Add a record at the tail. Records with an id get a fresh one first.
    pub fn append<T: Stored>(&mut self, mut item: T) -> Result<T, GuardError> {
        if item.id().is_some() {
            item.assign_id(self.next_id::<T>());
        }
        let mut items = T::slot(self).clone();
        items.push(item.clone());
        self.replace_all(items)?;
        Ok(item)
    }

    /// Add a record at the head. Records with an id get a fresh one first.
    pub fn prepend<T: Stored>(&mut self, mut item: T) -> Result<T, GuardError> {
        if item.id().is_some() {
            item.assign_id(self.next_id::<T>());
        }
        let mut items = Vec::with_capacity(T::slot(self).len() + 1);
        items.push(item.clone());
        items.extend_from_slice(T::slot(self));
        self.replace_all(items)?;
        Ok(item)
    }

    /// Delete the weight entry at `index` once `confirm` agrees.
    ///
    /// The sole remaining entry is never deleted, and nothing is asked or
    /// written in that case.
    pub fn remove_weight_at<F>(&mut self, index: usize, confirm: F) -> Result<Removal, GuardError>
    where
        F: FnOnce(&WeightEntry) -> bool,
    {
        let len = self.weights.len();
        if len <= 1 {
            return Err(GuardError::LastElement);
        }
        if index >= len {
            return Err(GuardError::IndexOutOfRange { index, len });
        }
        if !confirm(&self.weights[index]) {
            return Ok(Removal::Declined);
        }

        let mut items = self.weights.clone();
        let removed = items.remove(index);
        self.replace_all(items)?;
        Ok(Removal::Removed(removed))
    }

    /// Drain notices queued by failed flushes.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn into_storage(self) -> Box<dyn KeyValueStorage> {
        self.storage
    }

    /// Timestamp id, bumped past the largest id in use so same-tick records stay unique.
    ///
    /// When the largest id is `i64::MAX` there is nothing above it, so the
    /// highest unused id at or below the clock is taken instead.
    fn next_id<T: Stored>(&self) -> i64 {
        let now = self.clock.now_millis();
        let items = T::slot(self);
        match items.iter().filter_map(T::id).max() {
            Some(max) if now <= max => max.checked_add(1).unwrap_or_else(|| {
                let used: HashSet<i64> = items.iter().filter_map(T::id).collect();
                warn!(key = T::KEY, "id space exhausted above {max}, reusing a free lower id");
                (i64::MIN..=now)
                    .rev()
                    .find(|id| !used.contains(id))
                    .unwrap_or(now)
            }),
            _ => now,
        }
    }

    fn persist<T: Stored>(&mut self) {
        let result = serde_json::to_string(T::slot(self))
            .map_err(|source| StoreError::Encode {
                key: T::KEY,
                source,
            })
            .and_then(|json| {
                self.storage
                    .set_item(T::KEY, &json)
                    .map_err(|source| StoreError::Write {
                        key: T::KEY,
                        source,
                    })
            });

        if let Err(err) = result {
            warn!(key = T::KEY, error = %err, "flush failed, keeping in-memory state only");
            let message = match &err {
                StoreError::Write {
                    source: StorageError::QuotaExceeded { .. },
                    ..
                } => "Storage full! Changes are kept for this session only.".to_string(),
                _ => format!("Could not save changes ({err}). They are kept for this session only."),
            };
            self.notices.push(Notice {
                key: T::KEY,
                message,
            });
        }
    }
}

fn load<T: Record>(storage: &dyn KeyValueStorage) -> Vec<T> {
    load_or(storage, T::seed)
}

fn load_or<T: Record>(storage: &dyn KeyValueStorage, seed: impl FnOnce() -> Vec<T>) -> Vec<T> {
    match read::<T>(storage) {
        Ok(items) => items,
        Err(StoreError::Missing(key)) => {
            debug!(key, "no stored value, using seed");
            seed()
        }
        Err(err) => {
            warn!(key = T::KEY, error = %err, "discarding stored value, using seed");
            seed()
        }
    }
}

fn read<T: Record>(storage: &dyn KeyValueStorage) -> Result<Vec<T>, StoreError> {
    let raw = storage
        .get_item(T::KEY)
        .map_err(|source| StoreError::Read { key: T::KEY, source })?
        .ok_or(StoreError::Missing(T::KEY))?;
    let items: Vec<T> = serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
        key: T::KEY,
        source,
    })?;
    T::check_collection(&items).map_err(|reason| StoreError::Invalid {
        key: T::KEY,
        reason,
    })?;
    Ok(items)
}
