//! World-state abstraction
//!
//! The contract sees the replicated key-value store only through
//! [`WorldState`]. Keys are UTF-8 strings and values opaque bytes. An
//! invocation's writes are collected into a [`WriteSet`] and handed to
//! [`WorldState::commit`] as one unit.

use crate::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Lazy prefix-scan result; dropping it releases the underlying cursor
pub type StateIter<'a> = Box<dyn Iterator<Item = Result<(String, Vec<u8>)>> + 'a>;

/// Key-value store the ledger runs on
pub trait WorldState: Send + Sync {
    /// Read a key; `None` when absent
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a single key outside any write-set
    fn put_state(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Apply a whole write-set atomically
    fn commit(&self, writes: WriteSet) -> Result<()>;

    /// Iterate all keys starting with `prefix`, in ascending key order
    fn scan_prefix<'a>(&'a self, prefix: &str) -> Result<StateIter<'a>>;
}

/// Ordered set of pending writes for one invocation
///
/// Remembers first-write order for commit; a second write to the same key
/// replaces the value in place.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    order: Vec<String>,
    values: BTreeMap<String, Vec<u8>>,
}

impl WriteSet {
    /// Empty write-set
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.values.insert(key, value);
    }

    /// Pending value for `key`
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Number of distinct keys written
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// No writes staged
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Writes in first-write order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> + '_ {
        self.order
            .iter()
            .filter_map(move |k| self.values.get(k).map(|v| (k.as_str(), v.as_slice())))
    }

    /// Pending writes under `prefix`, in key order
    pub fn range_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Vec<u8>)> + 'a {
        self.values
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    /// Consume into `(key, value)` pairs in first-write order
    pub fn into_entries(mut self) -> Vec<(String, Vec<u8>)> {
        let mut entries = Vec::with_capacity(self.order.len());
        for key in self.order {
            if let Some(value) = self.values.remove(&key) {
                entries.push((key, value));
            }
        }
        entries
    }
}

/// In-memory world state
#[derive(Debug, Default)]
pub struct MemoryState {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryState {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl WorldState for MemoryState {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut entries = self.entries.write();
        for (key, value) in writes.into_entries() {
            entries.insert(key, value);
        }
        Ok(())
    }

    fn scan_prefix<'a>(&'a self, prefix: &str) -> Result<StateIter<'a>> {
        // Snapshot the matching range so no lock is held while the caller iterates
        let matched: Vec<(String, Vec<u8>)> = self
            .entries
            .read()
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Box::new(matched.into_iter().map(Ok)))
    }
}
