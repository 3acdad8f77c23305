//! Persistent unordered hash map.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops;

use archery::{ArcK, RcK, SharedPointerKind};

use crate::champ::Trie;
use crate::hash;
use crate::iter::{Iter, Keys, Values};
use crate::node::Entry;
use crate::owner::{Epoch, Owner};

/// Persistent hash map based on a CHAMP trie.
///
/// Every write returns a new map and leaves `self` untouched; the two share
/// all trie nodes off the written path. A write that changes nothing returns
/// a map whose root is the very same node, which [`ptr_eq`](Self::ptr_eq)
/// detects in O(1).
///
/// `P` selects the node pointer: [`RcK`] here, `ArcK` for
/// [`ChampMapSync`](crate::ChampMapSync).
pub struct ChampMap<K, V, S = RandomState, P = RcK>
where
    P: SharedPointerKind,
{
    trie: Trie<K, V, P>,
    hasher: S,
}

/// Transient view of a [`ChampMap`] for batched edits.
///
/// Created by [`ChampMap::mutate`]. Nodes the builder has already copied are
/// edited in place by later writes; [`finish`](Self::finish) seals the result.
pub struct ChampMapBuilder<K, V, S = RandomState, P = RcK>
where
    P: SharedPointerKind,
{
    trie: Trie<K, V, P>,
    hasher: S,
    epoch: Epoch,
}

// ---------------------------------------------------------------------------
// Construction & accessors: no trait bounds
// ---------------------------------------------------------------------------

impl<K, V> ChampMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V> ChampMap<K, V, RandomState, ArcK> {
    /// Creates an empty thread-safe map.
    #[must_use]
    pub fn new_sync() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S, P: SharedPointerKind> ChampMap<K, V, S, P> {
    /// Creates an empty map that hashes keys with `hasher`.
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            trie: Trie::new(),
            hasher,
        }
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trie.len
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.trie.len == 0
    }

    /// Returns `true` if both maps share the same root node, i.e. one is an
    /// unchanged descendant of the other.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.trie.ptr_eq(&other.trie)
    }

    /// Returns an iterator over `(&K, &V)` pairs.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V, P> {
        Iter::new(self.trie.iter())
    }

    /// Returns an iterator over the keys.
    #[must_use]
    pub fn keys(&self) -> Keys<Iter<'_, K, V, P>> {
        Keys::new(self.iter())
    }

    /// Returns an iterator over the values.
    #[must_use]
    pub fn values(&self) -> Values<Iter<'_, K, V, P>> {
        Values::new(self.iter())
    }

    /// Calls `f` on every entry.
    pub fn for_each<F: FnMut(&K, &V)>(&self, mut f: F) {
        self.iter().for_each(|(key, value)| f(key, value));
    }

    /// Returns the first value whose entry satisfies `predicate`.
    pub fn find<F: FnMut(&K, &V) -> bool>(&self, mut predicate: F) -> Option<&V> {
        self.iter()
            .find(|(key, value)| predicate(key, value))
            .map(|(_, value)| value)
    }
}

// ---------------------------------------------------------------------------
// Read operations: K: Hash + Eq
// ---------------------------------------------------------------------------

impl<K: Hash + Eq, V, S: BuildHasher, P: SharedPointerKind> ChampMap<K, V, S, P> {
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.trie.get(hash::hash_key(&self.hasher, key), key)
    }

    /// Returns `true` if the map contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

// ---------------------------------------------------------------------------
// Write operations: K: Hash + Eq + Clone, V: Clone
// ---------------------------------------------------------------------------

impl<K, V, S, P> ChampMap<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
    P: SharedPointerKind,
{
    /// Returns a map with `key` bound to `value`, using `eq` in place of
    /// `PartialEq` to detect that the binding is unchanged.
    ///
    /// If `key` already maps to a value `eq` accepts the result shares this
    /// map's root. Nested persistent values can pass an identity check such
    /// as [`ChampMap::ptr_eq`] to keep the no-op test O(1).
    #[must_use]
    pub fn set_with<F: Fn(&V, &V) -> bool>(&self, key: K, value: V, eq: F) -> Self {
        let mut next = self.clone();
        set_entry(&mut next.trie, &next.hasher, &mut Epoch::lazy(), key, value, &eq);
        next
    }

    /// Returns a map without `key`. A missing key yields a map sharing this
    /// map's root.
    #[must_use]
    pub fn delete(&self, key: &K) -> Self {
        let mut next = self.clone();
        let hash = hash::hash_key(&self.hasher, key);
        next.trie.remove(&mut Epoch::lazy(), hash, key);
        next
    }

    /// Returns a map holding only the entries for which `predicate` is true.
    ///
    /// If every entry is kept the result shares this map's root.
    #[must_use]
    pub fn filter<F: FnMut(&K, &V) -> bool>(&self, mut predicate: F) -> Self {
        let rejected: Vec<K> = self
            .iter()
            .filter(|(key, value)| !predicate(key, value))
            .map(|(key, _)| key.clone())
            .collect();
        let mut builder = self.mutate();
        for key in &rejected {
            builder.delete(key);
        }
        builder.finish()
    }

    /// Returns a builder for batched edits starting from this map.
    #[must_use]
    pub fn mutate(&self) -> ChampMapBuilder<K, V, S, P> {
        ChampMapBuilder {
            trie: self.trie.clone(),
            hasher: self.hasher.clone(),
            epoch: Epoch::scoped(),
        }
    }
}

// ---------------------------------------------------------------------------
// Write operations: V: PartialEq
// ---------------------------------------------------------------------------

impl<K, V, S, P> ChampMap<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher + Clone,
    P: SharedPointerKind,
{
    /// Returns a map with `key` bound to `value`.
    ///
    /// If `key` already maps to an equal value the result shares this map's
    /// root.
    #[must_use]
    pub fn set(&self, key: K, value: V) -> Self {
        self.set_with(key, value, V::eq)
    }

    /// Returns a map with the value at `key` replaced by `f(value)`.
    ///
    /// A missing key, or an `f` that returns an equal value, yields a map
    /// sharing this map's root.
    #[must_use]
    pub fn update<F: FnOnce(&V) -> V>(&self, key: &K, f: F) -> Self {
        match self.get(key) {
            Some(value) => self.set(key.clone(), f(value)),
            None => self.clone(),
        }
    }

    /// Returns a map with every value replaced by `f(key, value)`.
    ///
    /// Sub-tries whose values all map to equal values are shared; if nothing
    /// changes the result shares this map's root.
    #[must_use]
    pub fn map_values<F: FnMut(&K, &V) -> V>(&self, f: F) -> Self {
        Self {
            trie: self.trie.map_values(Owner::NONE, f),
            hasher: self.hasher.clone(),
        }
    }
}

impl<K: Clone, V, S: Clone, P: SharedPointerKind> ChampMap<K, V, S, P> {
    /// Returns a map with the same keys and values of a new type.
    #[must_use]
    pub fn map<W, F: FnMut(&K, &V) -> W>(&self, f: F) -> ChampMap<K, W, S, P> {
        ChampMap {
            trie: self.trie.map(Owner::NONE, f),
            hasher: self.hasher.clone(),
        }
    }
}

fn set_entry<K, V, S, P>(
    trie: &mut Trie<K, V, P>,
    hasher: &S,
    epoch: &mut Epoch,
    key: K,
    value: V,
    eq: &impl Fn(&V, &V) -> bool,
) where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
    P: SharedPointerKind,
{
    let hash = hash::hash_key(hasher, &key);
    trie.insert(epoch, Entry { hash, key, value }, eq);
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

impl<K, V, S, P> ChampMapBuilder<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
    P: SharedPointerKind,
{
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.trie.get(hash::hash_key(&self.hasher, key), key)
    }

    /// Returns `true` if the builder contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trie.len
    }

    /// Returns `true` if the builder contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.trie.len == 0
    }

    /// Binds `key` to `value`; a present value `eq` accepts is kept as is.
    pub fn set_with<F: Fn(&V, &V) -> bool>(&mut self, key: K, value: V, eq: F) -> &mut Self {
        set_entry(&mut self.trie, &self.hasher, &mut self.epoch, key, value, &eq);
        self
    }

    /// Removes `key`; a missing key is a no-op.
    pub fn delete(&mut self, key: &K) -> &mut Self {
        let hash = hash::hash_key(&self.hasher, key);
        self.trie.remove(&mut self.epoch, hash, key);
        self
    }

    /// Seals the builder into an immutable map.
    #[must_use]
    pub fn finish(self) -> ChampMap<K, V, S, P> {
        ChampMap {
            trie: self.trie,
            hasher: self.hasher,
        }
    }
}

impl<K, V, S, P> ChampMapBuilder<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher,
    P: SharedPointerKind,
{
    /// Binds `key` to `value`.
    pub fn set(&mut self, key: K, value: V) -> &mut Self {
        self.set_with(key, value, V::eq)
    }

    /// Replaces the value at `key` with `f(value)`; a missing key is a no-op.
    pub fn update<F: FnOnce(&V) -> V>(&mut self, key: &K, f: F) -> &mut Self {
        if let Some(value) = self.get(key).map(f) {
            self.set(key.clone(), value);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl<K, V, S: Clone, P: SharedPointerKind> Clone for ChampMap<K, V, S, P> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie.clone(),
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V, S: Default, P: SharedPointerKind> Default for ChampMap<K, V, S, P> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, P: SharedPointerKind> fmt::Debug for ChampMap<K, V, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, P> fmt::Debug for ChampMapBuilder<K, V, S, P>
where
    P: SharedPointerKind,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChampMapBuilder")
            .field("len", &self.trie.len)
            .finish_non_exhaustive()
    }
}

impl<K, V, S, P> PartialEq for ChampMap<K, V, S, P>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    P: SharedPointerKind,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.len() == other.len()
                && self.iter().all(|(key, value)| other.get(key) == Some(value)))
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher, P: SharedPointerKind> Eq for ChampMap<K, V, S, P> {}

impl<K, V, S, P> Extend<(K, V)> for ChampMap<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher + Clone,
    P: SharedPointerKind,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let mut builder = self.mutate();
        for (key, value) in iter {
            builder.set(key, value);
        }
        *self = builder.finish();
    }
}

impl<K, V, S, P> FromIterator<(K, V)> for ChampMap<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher + Clone + Default,
    P: SharedPointerKind,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V, S: BuildHasher, P: SharedPointerKind> ops::Index<&K> for ChampMap<K, V, S, P> {
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

impl<'a, K, V, S, P: SharedPointerKind> IntoIterator for &'a ChampMap<K, V, S, P> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, P>;

    fn into_iter(self) -> Iter<'a, K, V, P> {
        self.iter()
    }
}

#[cfg(test)]
impl<K, V, S, P: SharedPointerKind> ChampMap<K, V, S, P> {
    pub(crate) const fn trie(&self) -> &Trie<K, V, P> {
        &self.trie
    }
}

#[cfg(test)]
impl<K, V, S, P: SharedPointerKind> ChampMapBuilder<K, V, S, P> {
    pub(crate) const fn trie(&self) -> &Trie<K, V, P> {
        &self.trie
    }
}
