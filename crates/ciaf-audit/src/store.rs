//! # In-Memory Artifact Stores
//!
//! Insertion-ordered, clone-on-read stores guarding the authoritative
//! anchor and receipt state. Locks are `parking_lot` and never held across
//! `.await` points; mutation is whole-artifact insert only, so readers
//! never observe a partially constructed record.
//!
//! Volatile by design — process lifetime only. These types are the seam a
//! durable backend would replace without changing the service contracts.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use ciaf_core::{DatasetAnchor, ProvenanceCapsule};

/// Thread-safe, cloneable store preserving insertion order.
///
/// Re-inserting an existing key replaces the value but keeps the key's
/// original position, so a status update never reorders a listing.
#[derive(Debug)]
pub struct OrderedStore<K: Eq + Hash + Clone, T: Clone> {
    inner: Arc<RwLock<OrderedInner<K, T>>>,
}

#[derive(Debug)]
struct OrderedInner<K, T> {
    entries: HashMap<K, T>,
    order: Vec<K>,
}

impl<K: Eq + Hash + Clone, T: Clone> Clone for OrderedStore<K, T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K: Eq + Hash + Clone, T: Clone> OrderedStore<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(OrderedInner {
                entries: HashMap::new(),
                order: Vec::new(),
            })),
        }
    }

    /// Insert or replace a record (whole-artifact).
    pub fn insert(&self, key: K, value: T) {
        let mut guard = self.inner.write();
        if guard.entries.insert(key.clone(), value).is_none() {
            guard.order.push(key);
        }
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<T> {
        self.inner.read().entries.get(key).cloned()
    }

    /// List all records in insertion order.
    pub fn list(&self) -> Vec<T> {
        let guard = self.inner.read();
        guard
            .order
            .iter()
            .filter_map(|k| guard.entries.get(k).cloned())
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, T: Clone> Default for OrderedStore<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An anchor plus the capsule batch its Merkle root was computed over.
///
/// The capsules are kept alongside the anchor so later item verification
/// can rebuild inclusion proofs without re-disclosing dataset content to
/// the engine beyond what the caller supplies.
#[derive(Debug, Clone)]
pub struct AnchorEntry {
    /// The immutable anchor artifact.
    pub anchor: DatasetAnchor,
    /// Capsules in original batch order.
    pub capsules: Vec<ProvenanceCapsule>,
}

/// Append-only anchor log with latest-per-dataset lookup.
///
/// Re-anchoring a dataset id appends a new entry and never touches the
/// existing one, so receipts referencing an earlier anchor remain
/// verifiable against the original commitment.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
    inner: Arc<RwLock<AnchorInner>>,
}

#[derive(Debug, Default)]
struct AnchorInner {
    log: Vec<AnchorEntry>,
    latest: HashMap<String, usize>,
}

impl AnchorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an anchor entry, making it the latest for its dataset id.
    pub fn append(&self, entry: AnchorEntry) {
        let mut guard = self.inner.write();
        let index = guard.log.len();
        guard.latest.insert(entry.anchor.dataset_id.clone(), index);
        guard.log.push(entry);
    }

    /// The most recent anchor entry for a dataset id.
    pub fn latest(&self, dataset_id: &str) -> Option<AnchorEntry> {
        let guard = self.inner.read();
        guard
            .latest
            .get(dataset_id)
            .and_then(|&i| guard.log.get(i))
            .cloned()
    }

    /// Every anchor ever created, in creation order.
    pub fn list(&self) -> Vec<DatasetAnchor> {
        self.inner.read().log.iter().map(|e| e.anchor.clone()).collect()
    }

    /// Number of anchors in the log.
    pub fn len(&self) -> usize {
        self.inner.read().log.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
