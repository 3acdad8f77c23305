//! Key hashing: maps a key to the 30-bit code the trie consumes.

use std::hash::{BuildHasher, Hash};

/// Width of a trie hash code in bits (six 5-bit levels).
pub const HASH_BITS: u32 = 30;

const HASH_MASK: u64 = (1 << HASH_BITS) - 1;

/// Hashes `key` with `hasher` and keeps the low [`HASH_BITS`] bits.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn hash_key<K, S>(hasher: &S, key: &K) -> u32
where
    K: Hash + ?Sized,
    S: BuildHasher,
{
    (hasher.hash_one(key) & HASH_MASK) as u32
}
