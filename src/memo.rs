//! Memoization utilities for the planner's pure functions (§5 "Memoization",
//! §9 "Global caches"). Keyed by an explicit hash of the logical inputs
//! rather than by reference identity, since this port doesn't have the
//! source's ambient object-identity hashing — the cache is still safe because
//! every input (stitching info, subschema set, requested field names) is
//! immutable for the lifetime of a composed schema.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use indexmap::IndexMap;

/// A small LRU-ish bounded cache: once `capacity` is exceeded the oldest
/// entry (by insertion order) is evicted. Bounding this avoids the unbounded
/// growth the source's identity-keyed cache would otherwise have across many
/// operations sharing one composed schema (§9).
pub struct PlanningCache<V> {
    capacity: usize,
    entries: Mutex<IndexMap<u64, V>>,
}

impl<V: Clone> PlanningCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn get_or_insert_with(&self, key: impl Hash, compute: impl FnOnce() -> V) -> V {
        let hash = hash_key(&key);
        {
            let entries = self.entries.lock().expect("planning cache poisoned");
            if let Some(value) = entries.get(&hash) {
                return value.clone();
            }
        }
        let value = compute();
        let mut entries = self.entries.lock().expect("planning cache poisoned");
        if entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(hash, value.clone());
        value
    }
}

fn hash_key(key: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_cached_value_for_identical_key() {
        let cache = PlanningCache::new(4);
        let mut calls = 0;
        let first = cache.get_or_insert_with("abc", || {
            calls += 1;
            42
        });
        let second = cache.get_or_insert_with("abc", || {
            calls += 1;
            99
        });
        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls, 1);
    }

    #[test]
    fn evicts_oldest_entry_past_capacity() {
        let cache: PlanningCache<i32> = PlanningCache::new(1);
        cache.get_or_insert_with("a", || 1);
        cache.get_or_insert_with("b", || 2);
        let mut recomputed = false;
        cache.get_or_insert_with("a", || {
            recomputed = true;
            1
        });
        assert!(recomputed);
    }
}
