//! CHAMP trie node types and bitmap helpers.

use archery::{SharedPointer, SharedPointerKind};

use crate::hash::HASH_BITS;
use crate::owner::{Owned, Owner};

/// Bits per trie level (5 → 32-way branching).
pub const BITS_PER_LEVEL: u32 = 5;

/// Shift of the deepest bitmap level. Entries that still share a slot below
/// it have identical hash codes and go to a collision node.
pub const MAX_SHIFT: u32 = HASH_BITS - BITS_PER_LEVEL;

/// Shared pointer to a trie node.
pub type Link<T, P> = SharedPointer<T, P>;

/// Inline entry storing a key-value pair with its precomputed hash.
pub struct Entry<K, V> {
    /// Precomputed 30-bit hash of the key.
    pub hash: u32,
    /// The key.
    pub key: K,
    /// The value.
    pub value: V,
}

/// Bitmap-compressed trie node.
///
/// Invariants: `data_map & node_map == 0`,
/// `entries.len() == data_map.count_ones()`,
/// `children.len() == node_map.count_ones()`.
pub struct Bitmap<K, V, P: SharedPointerKind> {
    pub owner: Owner,
    /// Bitmap of positions occupied by inline entries.
    pub data_map: u32,
    /// Bitmap of positions occupied by child subtrees.
    pub node_map: u32,
    pub entries: Vec<Entry<K, V>>,
    pub children: Vec<Child<K, V, P>>,
}

/// Linear node for keys sharing the same full hash code.
///
/// Invariant: `entries.len() >= 2` while referenced by a parent.
pub struct Collision<K, V> {
    pub owner: Owner,
    pub hash: u32,
    pub entries: Vec<Entry<K, V>>,
}

/// Child slot of a bitmap node.
pub enum Child<K, V, P: SharedPointerKind> {
    Branch(Link<Bitmap<K, V, P>, P>),
    Collision(Link<Collision<K, V>, P>),
}

// ---------------------------------------------------------------------------
// Bitmap helpers
// ---------------------------------------------------------------------------

/// Extracts the 5-bit hash fragment at the given bit-shift depth.
#[inline]
#[must_use]
pub const fn fragment(hash: u32, shift: u32) -> u32 {
    (hash >> shift) & 0x1F
}

/// Returns the single-bit mask for the given fragment (0..31).
#[inline]
#[must_use]
pub const fn mask(frag: u32) -> u32 {
    1 << frag
}

/// Returns the compact index of `bit` within `bitmap`.
///
/// Counts the number of set bits below `bit`.
#[inline]
#[must_use]
pub const fn index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// ---------------------------------------------------------------------------
// Node accessors
// ---------------------------------------------------------------------------

impl<K, V, P: SharedPointerKind> Bitmap<K, V, P> {
    /// Creates a node with no entries and no children.
    pub const fn empty(owner: Owner) -> Self {
        Self {
            owner,
            data_map: 0,
            node_map: 0,
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the sole entry if this node holds exactly one entry and no
    /// children, i.e. it must be inlined into its parent.
    pub fn single_entry(&self) -> Option<&Entry<K, V>> {
        match self.entries.as_slice() {
            [entry] if self.node_map == 0 => Some(entry),
            _ => None,
        }
    }

    /// Checks the local bitmap invariants.
    pub fn debug_check(&self) {
        debug_assert_eq!(self.data_map & self.node_map, 0, "overlapping bitmaps");
        debug_assert_eq!(self.entries.len(), self.data_map.count_ones() as usize);
        debug_assert_eq!(self.children.len(), self.node_map.count_ones() as usize);
        debug_assert!(
            self.children.iter().all(|c| c.single_entry().is_none()),
            "single-entry child left behind a pointer"
        );
    }
}

impl<K, V, P: SharedPointerKind> Child<K, V, P> {
    /// Returns the sole entry of a child that must be inlined.
    pub fn single_entry(&self) -> Option<&Entry<K, V>> {
        match self {
            Self::Branch(node) => node.single_entry(),
            Self::Collision(node) => match node.entries.as_slice() {
                [entry] => Some(entry),
                _ => None,
            },
        }
    }

    /// Returns `true` if both slots point at the same node object.
    #[cfg(test)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Branch(a), Self::Branch(b)) => SharedPointer::ptr_eq(a, b),
            (Self::Collision(a), Self::Collision(b)) => SharedPointer::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Manual trait impls: avoid false `P: Clone` bounds.
// ---------------------------------------------------------------------------

impl<K: Clone, V: Clone> Clone for Entry<K, V> {
    fn clone(&self) -> Self {
        Self {
            hash: self.hash,
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

impl<K: Clone, V: Clone, P: SharedPointerKind> Clone for Bitmap<K, V, P> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            data_map: self.data_map,
            node_map: self.node_map,
            entries: self.entries.clone(),
            children: self.children.clone(),
        }
    }
}

impl<K: Clone, V: Clone> Clone for Collision<K, V> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            hash: self.hash,
            entries: self.entries.clone(),
        }
    }
}

impl<K, V, P: SharedPointerKind> Clone for Child<K, V, P> {
    fn clone(&self) -> Self {
        match self {
            Self::Branch(node) => Self::Branch(SharedPointer::clone(node)),
            Self::Collision(node) => Self::Collision(SharedPointer::clone(node)),
        }
    }
}

impl<K: Clone, V: Clone, P: SharedPointerKind> Owned for Bitmap<K, V, P> {
    fn owner(&self) -> Owner {
        self.owner
    }

    fn set_owner(&mut self, owner: Owner) {
        self.owner = owner;
    }
}

impl<K: Clone, V: Clone> Owned for Collision<K, V> {
    fn owner(&self) -> Owner {
        self.owner
    }

    fn set_owner(&mut self, owner: Owner) {
        self.owner = owner;
    }
}
