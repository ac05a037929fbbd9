//! Record-store seam for the abuse-prevention maps.
//!
//! The algorithmic modules never touch a map type directly; they go through
//! `MemoryStore`. A multi-instance deployment can substitute a shared backing
//! store behind the same `RecordStore` surface without touching the rate
//! limiting or session logic. That substitution is an extension point; the
//! in-memory store is the only implementation shipped.

use std::hash::Hash;

use dashmap::DashMap;

/// Minimal store contract: get/set/delete plus a predicate sweep.
pub trait RecordStore<K, V> {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&self, key: K, value: V);
    fn delete(&self, key: &K) -> bool;
    /// Drop every entry the predicate rejects. The predicate may also repair
    /// an entry in place (e.g. clear an expired block) and keep it.
    fn sweep(&self, keep: impl FnMut(&K, &mut V) -> bool);
    fn len(&self) -> usize;
}

/// Concurrent in-memory store. Sweeps and in-flight decisions may run in
/// parallel; per-shard locking makes each entry operation atomic.
pub struct MemoryStore<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> MemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Read-modify-write under the entry lock. `make` supplies the value for
    /// an absent key; `apply` runs against the stored value either way.
    pub fn update_or_insert<R>(
        &self,
        key: K,
        make: impl FnOnce() -> V,
        apply: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut entry = self.inner.entry(key).or_insert_with(make);
        apply(entry.value_mut())
    }

    /// Mutate an existing entry under the entry lock. Never inserts; `None`
    /// when the key is absent, so a concurrent delete stays deleted.
    pub fn update<R>(&self, key: &K, apply: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.inner.get_mut(key).map(|mut entry| apply(entry.value_mut()))
    }
}

impl<K, V> Default for MemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecordStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    fn delete(&self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    fn sweep(&self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        self.inner.retain(|k, v| keep(k, v));
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
