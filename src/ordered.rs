//! Persistent insertion-ordered map.
//!
//! Two structures move in lockstep: a CHAMP trie from key to sequence id, and
//! a B-tree from sequence id to `(key, value)`. Sequence ids come from a
//! per-map counter that only grows, so the B-tree's key order is insertion
//! order, and deleting then reinserting a key moves it to the end.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops;

use archery::{ArcK, RcK, SharedPointerKind};

use crate::btree::{Seq, Tree};
use crate::champ::Trie;
use crate::hash;
use crate::iter::{Keys, OrderedIter, Values};
use crate::node::Entry;
use crate::owner::{Epoch, Owner};

/// Persistent hash map that iterates in insertion order.
///
/// Overwriting an existing key keeps its position. Every write returns a new
/// map; writes that change nothing return a map sharing this map's nodes, so
/// [`ptr_eq`](Self::ptr_eq) holds.
pub struct OrderedMap<K, V, S = RandomState, P = RcK>
where
    P: SharedPointerKind,
{
    core: Lockstep<K, V, P>,
    hasher: S,
}

/// Transient view of an [`OrderedMap`] for batched edits.
///
/// Created by [`OrderedMap::mutate`]; sealed by [`finish`](Self::finish).
pub struct OrderedMapBuilder<K, V, S = RandomState, P = RcK>
where
    P: SharedPointerKind,
{
    core: Lockstep<K, V, P>,
    hasher: S,
    epoch: Epoch,
}

/// Trie and B-tree roots plus the next unused sequence id.
struct Lockstep<K, V, P: SharedPointerKind> {
    index: Trie<K, Seq, P>,
    entries: Tree<(K, V), P>,
    next_seq: Seq,
}

impl<K, V, P: SharedPointerKind> Lockstep<K, V, P> {
    fn new() -> Self {
        Self {
            index: Trie::new(),
            entries: Tree::new(),
            next_seq: 0,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        self.index.ptr_eq(&other.index) && self.entries.ptr_eq(&other.entries)
    }

    fn get<S>(&self, hasher: &S, key: &K) -> Option<&V>
    where
        K: Hash + Eq,
        S: BuildHasher,
    {
        let seq = self.index.get(hash::hash_key(hasher, key), key)?;
        self.entries.get(*seq).map(|(_, value)| value)
    }
}

impl<K, V, P> Lockstep<K, V, P>
where
    K: Hash + Eq + Clone,
    V: Clone,
    P: SharedPointerKind,
{
    fn set<S, F>(&mut self, hasher: &S, epoch: &mut Epoch, key: K, value: V, eq: &F)
    where
        S: BuildHasher,
        F: Fn(&V, &V) -> bool,
    {
        let hash = hash::hash_key(hasher, &key);
        if let Some(&seq) = self.index.get(hash, &key) {
            self.entries
                .insert(epoch, seq, (key, value), &|old, new| eq(&old.1, &new.1));
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(
            epoch,
            Entry {
                hash,
                key: key.clone(),
                value: seq,
            },
            &|_, _| false,
        );
        self.entries.insert(epoch, seq, (key, value), &|_, _| false);
    }

    fn delete<S: BuildHasher>(&mut self, hasher: &S, epoch: &mut Epoch, key: &K) {
        let hash = hash::hash_key(hasher, key);
        if let Some(seq) = self.index.remove(epoch, hash, key) {
            let removed = self.entries.remove(epoch, seq);
            debug_assert!(removed.is_some(), "index and entries out of step");
        }
    }
}

impl<K, V, P: SharedPointerKind> Clone for Lockstep<K, V, P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            entries: self.entries.clone(),
            next_seq: self.next_seq,
        }
    }
}

// ---------------------------------------------------------------------------
// Construction & accessors
// ---------------------------------------------------------------------------

impl<K, V> OrderedMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V> OrderedMap<K, V, RandomState, ArcK> {
    /// Creates an empty thread-safe map.
    #[must_use]
    pub fn new_sync() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S, P: SharedPointerKind> OrderedMap<K, V, S, P> {
    /// Creates an empty map that hashes keys with `hasher`.
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            core: Lockstep::new(),
            hasher,
        }
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if both maps share the same roots.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.core.ptr_eq(&other.core)
    }

    /// Returns an iterator over `(&K, &V)` pairs in insertion order.
    #[must_use]
    pub fn iter(&self) -> OrderedIter<'_, K, V, P> {
        OrderedIter::new(self.core.entries.iter())
    }

    /// Returns an iterator over the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Keys<OrderedIter<'_, K, V, P>> {
        Keys::new(self.iter())
    }

    /// Returns an iterator over the values in insertion order.
    #[must_use]
    pub fn values(&self) -> Values<OrderedIter<'_, K, V, P>> {
        Values::new(self.iter())
    }

    /// Returns the oldest entry.
    #[must_use]
    pub fn first(&self) -> Option<(&K, &V)> {
        self.core.entries.first().map(|(_, (key, value))| (key, value))
    }

    /// Returns the most recently inserted entry.
    #[must_use]
    pub fn last(&self) -> Option<(&K, &V)> {
        self.core.entries.last().map(|(_, (key, value))| (key, value))
    }

    /// Calls `f` on every entry in insertion order.
    pub fn for_each<F: FnMut(&K, &V)>(&self, mut f: F) {
        self.iter().for_each(|(key, value)| f(key, value));
    }

    /// Returns the first value, in insertion order, whose entry satisfies
    /// `predicate`.
    pub fn find<F: FnMut(&K, &V) -> bool>(&self, mut predicate: F) -> Option<&V> {
        self.iter()
            .find(|(key, value)| predicate(key, value))
            .map(|(_, value)| value)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher, P: SharedPointerKind> OrderedMap<K, V, S, P> {
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.core.get(&self.hasher, key)
    }

    /// Returns `true` if the map contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.core
            .index
            .get(hash::hash_key(&self.hasher, key), key)
            .is_some()
    }
}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

impl<K, V, S, P> OrderedMap<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
    P: SharedPointerKind,
{
    /// Returns a map with `key` bound to `value`, using `eq` in place of
    /// `PartialEq` to detect that the binding is unchanged.
    ///
    /// Position rules match [`set`](Self::set). Nested persistent values can
    /// pass an identity check such as [`OrderedMap::ptr_eq`] to keep the
    /// no-op test O(1).
    #[must_use]
    pub fn set_with<F: Fn(&V, &V) -> bool>(&self, key: K, value: V, eq: F) -> Self {
        let mut next = self.clone();
        next.core.set(&self.hasher, &mut Epoch::lazy(), key, value, &eq);
        next
    }

    /// Returns a map without `key`. A missing key yields a map sharing this
    /// map's roots.
    #[must_use]
    pub fn delete(&self, key: &K) -> Self {
        let mut next = self.clone();
        next.core.delete(&self.hasher, &mut Epoch::lazy(), key);
        next
    }

    /// Returns a map holding only the entries for which `predicate` is true,
    /// in the same order.
    ///
    /// If every entry is kept the result shares this map's roots.
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
    pub fn mutate(&self) -> OrderedMapBuilder<K, V, S, P> {
        OrderedMapBuilder {
            core: self.core.clone(),
            hasher: self.hasher.clone(),
            epoch: Epoch::scoped(),
        }
    }
}

impl<K, V, S, P> OrderedMap<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher + Clone,
    P: SharedPointerKind,
{
    /// Returns a map with `key` bound to `value`.
    ///
    /// A new key goes to the end of the iteration order; an existing key
    /// keeps its place. Rebinding a key to an equal value returns a map
    /// sharing this map's roots.
    #[must_use]
    pub fn set(&self, key: K, value: V) -> Self {
        self.set_with(key, value, V::eq)
    }

    /// Returns a map with the value at `key` replaced by `f(value)`.
    ///
    /// A missing key, or an `f` that returns an equal value, yields a map
    /// sharing this map's roots.
    #[must_use]
    pub fn update<F: FnOnce(&V) -> V>(&self, key: &K, f: F) -> Self {
        match self.get(key) {
            Some(value) => self.set(key.clone(), f(value)),
            None => self.clone(),
        }
    }

    /// Returns a map with every value replaced by `f(key, value)`, in the
    /// same order. `f` sees the entries in insertion order.
    ///
    /// The key index is shared with this map. If nothing changes the result
    /// shares this map's roots.
    #[must_use]
    pub fn map_values<F: FnMut(&K, &V) -> V>(&self, mut f: F) -> Self {
        let entries = self.core.entries.map_values(Owner::NONE, |(key, value)| {
            let mapped = f(key, value);
            (mapped != *value).then(|| (key.clone(), mapped))
        });
        Self {
            core: Lockstep {
                index: self.core.index.clone(),
                entries,
                next_seq: self.core.next_seq,
            },
            hasher: self.hasher.clone(),
        }
    }
}

impl<K: Clone, V, S: Clone, P: SharedPointerKind> OrderedMap<K, V, S, P> {
    /// Returns a map with the same keys, in the same order, and values of a
    /// new type. `f` sees the entries in insertion order.
    #[must_use]
    pub fn map<W, F: FnMut(&K, &V) -> W>(&self, mut f: F) -> OrderedMap<K, W, S, P> {
        OrderedMap {
            core: Lockstep {
                index: self.core.index.clone(),
                entries: self
                    .core
                    .entries
                    .map(Owner::NONE, |(key, value)| (key.clone(), f(key, value))),
                next_seq: self.core.next_seq,
            },
            hasher: self.hasher.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

impl<K, V, S, P> OrderedMapBuilder<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
    P: SharedPointerKind,
{
    /// Returns a reference to the value associated with `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.core.get(&self.hasher, key)
    }

    /// Returns `true` if the builder contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of key-value pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` if the builder contains no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Binds `key` to `value`; a present value `eq` accepts is kept as is.
    pub fn set_with<F: Fn(&V, &V) -> bool>(&mut self, key: K, value: V, eq: F) -> &mut Self {
        self.core.set(&self.hasher, &mut self.epoch, key, value, &eq);
        self
    }

    /// Removes `key`; a missing key is a no-op.
    pub fn delete(&mut self, key: &K) -> &mut Self {
        self.core.delete(&self.hasher, &mut self.epoch, key);
        self
    }

    /// Seals the builder into an immutable map.
    #[must_use]
    pub fn finish(self) -> OrderedMap<K, V, S, P> {
        OrderedMap {
            core: self.core,
            hasher: self.hasher,
        }
    }
}

impl<K, V, S, P> OrderedMapBuilder<K, V, S, P>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher,
    P: SharedPointerKind,
{
    /// Binds `key` to `value`; a new key goes to the end.
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

impl<K, V, S: Clone, P: SharedPointerKind> Clone for OrderedMap<K, V, S, P> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V, S: Default, P: SharedPointerKind> Default for OrderedMap<K, V, S, P> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, P: SharedPointerKind> fmt::Debug for OrderedMap<K, V, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, P: SharedPointerKind> fmt::Debug for OrderedMapBuilder<K, V, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMapBuilder")
            .field("len", &self.core.len())
            .field("next_seq", &self.core.next_seq)
            .finish_non_exhaustive()
    }
}

/// Two ordered maps are equal when they hold equal entries in the same order.
impl<K: PartialEq, V: PartialEq, S, P: SharedPointerKind> PartialEq for OrderedMap<K, V, S, P> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.len() == other.len() && self.iter().eq(other.iter()))
    }
}

impl<K: Eq, V: Eq, S, P: SharedPointerKind> Eq for OrderedMap<K, V, S, P> {}

impl<K, V, S, P> Extend<(K, V)> for OrderedMap<K, V, S, P>
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

impl<K, V, S, P> FromIterator<(K, V)> for OrderedMap<K, V, S, P>
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

impl<K: Hash + Eq, V, S: BuildHasher, P: SharedPointerKind> ops::Index<&K>
    for OrderedMap<K, V, S, P>
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        self.get(key).expect("key not found")
    }
}

impl<'a, K, V, S, P: SharedPointerKind> IntoIterator for &'a OrderedMap<K, V, S, P> {
    type Item = (&'a K, &'a V);
    type IntoIter = OrderedIter<'a, K, V, P>;

    fn into_iter(self) -> OrderedIter<'a, K, V, P> {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Structure validation (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
impl<K: Hash + Eq, V, S: BuildHasher, P: SharedPointerKind> OrderedMap<K, V, S, P> {
    pub(crate) const fn index(&self) -> &Trie<K, Seq, P> {
        &self.core.index
    }

    pub(crate) const fn entries(&self) -> &Tree<(K, V), P> {
        &self.core.entries
    }

    /// Validates both structures and that they describe the same entries.
    pub(crate) fn check(&self) {
        let indexed = self.core.index.check();
        let stored = self.core.entries.check();
        assert_eq!(indexed, stored, "index and entries disagree on size");
        for (seq, (key, _)) in self.core.entries.iter() {
            assert!(seq < self.core.next_seq, "sequence id from the future");
            let hash = hash::hash_key(&self.hasher, key);
            assert_eq!(self.core.index.get(hash, key), Some(&seq), "index points elsewhere");
        }
    }
}

#[cfg(test)]
impl<K, V, S, P: SharedPointerKind> OrderedMapBuilder<K, V, S, P> {
    pub(crate) const fn entries(&self) -> &Tree<(K, V), P> {
        &self.core.entries
    }
}
