//! Persisted record of already-published items.

use std::collections::{HashSet, VecDeque};

use crate::error::AppError;
use crate::models::DedupKey;
use crate::state::SEEN_KEY;
use crate::traits::StateStore;

/// Default number of keys remembered before the oldest are evicted.
pub const DEFAULT_SEEN_CAPACITY: usize = 1000;

/// Bounded, insertion-ordered set of dedup keys.
///
/// Eviction is FIFO: re-marking a key that is already present does not
/// move it, so the oldest *published* items are forgotten first.
#[derive(Debug, Clone)]
pub struct SeenStore {
    order: VecDeque<DedupKey>,
    members: HashSet<DedupKey>,
    capacity: usize,
}

impl SeenStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild from a persisted list, oldest first. Duplicates are dropped
    /// and only the newest `capacity` keys are kept.
    pub fn from_keys(keys: impl IntoIterator<Item = DedupKey>, capacity: usize) -> Self {
        let mut store = Self::new(capacity);
        for key in keys {
            store.insert(key);
        }
        store
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.members.contains(key)
    }

    /// Insert a key, evicting the oldest entries while over capacity.
    /// Returns false if the key was already present.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        if self.members.contains(&key) {
            return false;
        }
        self.members.insert(key.clone());
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &DedupKey> {
        self.order.iter()
    }
}

/// Novelty oracle over a [`SeenStore`] persisted in a [`StateStore`].
pub struct Deduplicator<S: StateStore> {
    store: S,
    seen: SeenStore,
    dirty: bool,
}

impl<S: StateStore> Deduplicator<S> {
    /// Load the seen list from `store`.
    ///
    /// Unreadable or malformed state degrades to an empty list: a lost
    /// history may cause a repost, refusing to run would lose everything.
    pub fn load(store: S, capacity: usize) -> Self {
        let seen = match Self::read_keys(&store) {
            Ok(keys) => SeenStore::from_keys(keys, capacity),
            Err(e) => {
                tracing::warn!(error = %e, "Seen list unreadable, starting empty");
                SeenStore::new(capacity)
            }
        };
        tracing::debug!(seen = seen.len(), capacity = seen.capacity(), "Seen list loaded");

        Self {
            store,
            seen,
            dirty: false,
        }
    }

    fn read_keys(store: &S) -> Result<Vec<DedupKey>, AppError> {
        match store.get(SEEN_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn is_new(&self, key: &DedupKey) -> bool {
        !self.seen.contains(key)
    }

    /// Record `key` as published and persist the list.
    ///
    /// Call only after the publish for this key succeeded. The in-memory
    /// mark always sticks; a persistence failure is returned so the caller
    /// can log it, and the list is written again on the next flush.
    pub fn mark_seen(&mut self, key: DedupKey) -> Result<(), AppError> {
        if self.seen.insert(key) {
            self.dirty = true;
            self.flush()?;
        }
        Ok(())
    }

    /// Write the seen list back if it changed since the last flush.
    pub fn flush(&mut self) -> Result<(), AppError> {
        if !self.dirty {
            return Ok(());
        }
        let keys: Vec<&DedupKey> = self.seen.keys().collect();
        self.store.set(SEEN_KEY, serde_json::to_value(keys)?)?;
        self.store.flush()?;
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn seen(&self) -> &SeenStore {
        &self.seen
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;
    use crate::testutil::FailingStore;
    use serde_json::json;

    fn key(s: &str) -> DedupKey {
        DedupKey::from_raw(s)
    }

    #[test]
    fn not_new_after_mark_seen() {
        let mut dedup = Deduplicator::load(MemoryStore::new(), 10);
        let k = key("https://x/1");
        assert!(dedup.is_new(&k));
        dedup.mark_seen(k.clone()).unwrap();
        assert!(!dedup.is_new(&k));
    }

    #[test]
    fn novelty_holds_after_arbitrary_history() {
        let mut dedup = Deduplicator::load(MemoryStore::new(), 3);
        for i in 0..20 {
            let k = key(&format!("https://x/{i}"));
            dedup.mark_seen(k.clone()).unwrap();
            assert!(!dedup.is_new(&k), "key {i} should be seen right after marking");
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut seen = SeenStore::new(2);
        seen.insert(key("a"));
        seen.insert(key("b"));
        seen.insert(key("c"));
        assert!(!seen.contains(&key("a")));
        assert!(seen.contains(&key("b")));
        assert!(seen.contains(&key("c")));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn re_marking_does_not_refresh_position() {
        let mut seen = SeenStore::new(2);
        seen.insert(key("a"));
        seen.insert(key("b"));
        assert!(!seen.insert(key("a")));
        seen.insert(key("c"));
        // FIFO, not LRU: "a" is still the oldest and goes first.
        assert!(!seen.contains(&key("a")));
        assert!(seen.contains(&key("b")));
    }

    #[test]
    fn mark_seen_persists_in_insertion_order() {
        let store = MemoryStore::new();
        let mut dedup = Deduplicator::load(store.clone(), 10);
        dedup.mark_seen(key("first")).unwrap();
        dedup.mark_seen(key("second")).unwrap();

        let persisted = store.snapshot(SEEN_KEY).unwrap();
        assert_eq!(
            persisted,
            json!([key("first").as_str(), key("second").as_str()])
        );
        assert!(!dedup.is_dirty());
    }

    #[test]
    fn reload_restores_seen_keys() {
        let store = MemoryStore::new();
        {
            let mut dedup = Deduplicator::load(store.clone(), 10);
            dedup.mark_seen(key("https://x/1")).unwrap();
        }
        let dedup = Deduplicator::load(store, 10);
        assert!(!dedup.is_new(&key("https://x/1")));
    }

    #[test]
    fn reload_truncates_to_capacity_keeping_newest() {
        let store = MemoryStore::new();
        let keys: Vec<String> = ["a", "b", "c", "d"]
            .iter()
            .map(|s| key(s).as_str().to_string())
            .collect();
        store.set(SEEN_KEY, json!(keys)).unwrap();

        let dedup = Deduplicator::load(store, 2);
        assert_eq!(dedup.seen().len(), 2);
        assert!(dedup.is_new(&key("a")));
        assert!(!dedup.is_new(&key("d")));
    }

    #[test]
    fn malformed_state_degrades_to_empty() {
        let store = MemoryStore::new();
        store.set(SEEN_KEY, json!({"not": "a list"})).unwrap();
        let dedup = Deduplicator::load(store, 10);
        assert!(dedup.seen().is_empty());
    }

    #[test]
    fn unreadable_state_degrades_to_empty() {
        let dedup = Deduplicator::load(FailingStore::new(), 10);
        assert!(dedup.seen().is_empty());
        assert!(dedup.is_new(&key("anything")));
    }

    #[test]
    fn write_failure_keeps_in_memory_mark() {
        let mut dedup = Deduplicator::load(FailingStore::new(), 10);
        let k = key("https://x/1");
        assert!(dedup.mark_seen(k.clone()).is_err());
        assert!(!dedup.is_new(&k));
        assert!(dedup.is_dirty());
    }

    #[test]
    fn flush_without_changes_is_noop() {
        let store = MemoryStore::new();
        let mut dedup = Deduplicator::load(store.clone(), 10);
        dedup.flush().unwrap();
        assert!(store.snapshot(SEEN_KEY).is_none());
    }
}
