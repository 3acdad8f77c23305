//! Persistent hash maps on a CHAMP trie, with an insertion-ordered variant
//! backed by an order-32 B-tree.
//!
//! CHAMP (Compressed Hash-Array Mapped Prefix-tree) is a refined HAMT that
//! keeps inline entries and child pointers in two separate bitmaps, so every
//! node stays dense and a sub-trie holding a single entry is always inlined
//! into its parent.
//!
//! # Maps
//!
//! - [`ChampMap`]: unordered persistent hash map.
//! - [`OrderedMap`]: persistent hash map that iterates in insertion order. A
//!   trie maps each key to a sequence id and a B-tree maps sequence ids to
//!   entries.
//!
//! Both are immutable: `set`, `update`, `delete`, `map_values` and `filter`
//! return a new map that shares every untouched node with the old one. A
//! write that changes nothing returns a map for which `ptr_eq` is true, so
//! callers can skip downstream work with an O(1) identity check.
//!
//! # Builders
//!
//! `mutate()` opens a builder tagged with a fresh owner id. Nodes the builder
//! has already copied carry its tag and are edited in place by its later
//! writes; `finish()` seals the result. Maps the builder was created from
//! never observe its edits.
//!
//! # Pointer kinds
//!
//! Nodes are reference counted through [`archery`]. The default pointer is
//! `Rc`; [`ChampMapSync`] and [`OrderedMapSync`] (created with `new_sync`)
//! use `Arc` and are `Send + Sync` when their keys, values and hasher are.
//!
//! # References
//!
//! - Steindorfer & Vinju, 2015, "Optimizing Hash-Array Mapped Tries
//!   for Fast and Lean Immutable JVM Collections", OOPSLA 2015
//! - Bagwell, 2001, "Ideal Hash Trees"

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::collections::hash_map::RandomState;

use archery::ArcK;

pub mod iter;

mod btree;
mod champ;
mod hash;
mod map;
mod node;
mod ops;
mod ordered;
mod owner;

#[cfg(test)]
mod tests;

pub use map::{ChampMap, ChampMapBuilder};
pub use ordered::{OrderedMap, OrderedMapBuilder};

/// Thread-safe [`ChampMap`] whose nodes are shared through `Arc`.
pub type ChampMapSync<K, V, S = RandomState> = ChampMap<K, V, S, ArcK>;

/// Thread-safe [`OrderedMap`] whose nodes are shared through `Arc`.
pub type OrderedMapSync<K, V, S = RandomState> = OrderedMap<K, V, S, ArcK>;
