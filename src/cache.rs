use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::parse::Notation;

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Least frequently used cache of parsed expressions, keyed by normalized
/// text. Safe to share between threads, every operation takes one lock.
#[derive(Debug)]
pub struct ParseCache {
    capacity: usize,
    inner: Mutex<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry {
    notation: Arc<Notation>,
    hits: u64,
    seq: u64,
}

impl ParseCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Entries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().map.contains_key(key)
    }

    /// Looks up `key`, counting the lookup as a use when it hits.
    pub fn get(&self, key: &str) -> Option<Arc<Notation>> {
        let mut entries = self.lock();
        match entries.map.get_mut(key) {
            Some(entry) => {
                entry.hits += 1;
                tracing::trace!(key, hits = entry.hits, "parse cache hit");
                Some(Arc::clone(&entry.notation))
            }
            None => {
                tracing::trace!(key, "parse cache miss");
                None
            }
        }
    }

    /// Stores `notation` under `key`, evicting the least used entry when
    /// full. Among equally used entries the oldest goes first. A key that is
    /// already stored keeps its entry and its use count.
    pub fn insert(&self, key: String, notation: Arc<Notation>) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.lock();
        if entries.map.contains_key(&key) {
            return;
        }
        if entries.map.len() >= self.capacity {
            entries.evict();
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.map.insert(
            key,
            Entry {
                notation,
                hits: 0,
                seq,
            },
        );
    }

    pub fn clear(&self) {
        self.lock().map.clear();
    }

    // Nothing in a critical section can leave the map half updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl Entries {
    fn evict(&mut self) {
        let victim = self
            .map
            .iter()
            .min_by_key(|(_, entry)| (entry.hits, entry.seq))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            tracing::debug!(key = %key, "evicting parse cache entry");
            self.map.remove(&key);
        }
    }
}
