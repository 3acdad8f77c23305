//! CHAMP trie root and its lazy cursor iterator.

use std::slice;

use archery::{SharedPointer, SharedPointerKind};

use crate::node::{Bitmap, Child, Entry, Link};
use crate::ops::get::get_recursive;
use crate::ops::insert::{Inserted, insert_recursive};
use crate::ops::map::{map_recursive, map_values_recursive};
use crate::ops::remove::remove_recursive;
use crate::owner::{Epoch, Owner};

/// A trie root together with its entry count.
pub struct Trie<K, V, P: SharedPointerKind> {
    pub root: Link<Bitmap<K, V, P>, P>,
    pub len: usize,
}

impl<K, V, P: SharedPointerKind> Trie<K, V, P> {
    pub fn new() -> Self {
        Self {
            root: SharedPointer::new(Bitmap::empty(Owner::NONE)),
            len: 0,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        SharedPointer::ptr_eq(&self.root, &other.root)
    }

    pub fn iter(&self) -> Iter<'_, K, V, P> {
        Iter::new(&self.root, self.len)
    }
}

impl<K: Eq, V, P: SharedPointerKind> Trie<K, V, P> {
    pub fn get(&self, hash: u32, key: &K) -> Option<&V> {
        get_recursive(&self.root, hash, key, 0)
    }
}

impl<K: Eq + Clone, V: Clone, P: SharedPointerKind> Trie<K, V, P> {
    /// Inserts `entry`. `eq` decides whether replacing an existing value is
    /// a no-op. Returns `false` if the trie did not change.
    pub fn insert(
        &mut self,
        epoch: &mut Epoch,
        entry: Entry<K, V>,
        eq: &impl Fn(&V, &V) -> bool,
    ) -> bool {
        match insert_recursive(&mut self.root, epoch, entry, 0, eq) {
            None => false,
            Some(Inserted::Replaced) => true,
            Some(Inserted::Added) => {
                self.len += 1;
                true
            }
        }
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, epoch: &mut Epoch, hash: u32, key: &K) -> Option<V> {
        let removed = remove_recursive(&mut self.root, epoch, hash, key, 0)?;
        self.len -= 1;
        Some(removed)
    }

    /// Maps values in place of type; shares the root when nothing changed.
    pub fn map_values<F>(&self, owner: Owner, mut f: F) -> Self
    where
        V: PartialEq,
        F: FnMut(&K, &V) -> V,
    {
        map_values_recursive(&self.root, owner, &mut f).map_or_else(
            || self.clone(),
            |root| Self {
                root,
                len: self.len,
            },
        )
    }
}

impl<K: Clone, V, P: SharedPointerKind> Trie<K, V, P> {
    /// Rebuilds the trie with mapped values of a new type.
    pub fn map<W, F>(&self, owner: Owner, mut f: F) -> Trie<K, W, P>
    where
        F: FnMut(&K, &V) -> W,
    {
        Trie {
            root: SharedPointer::new(map_recursive(&self.root, owner, &mut f)),
            len: self.len,
        }
    }
}

impl<K, V, P: SharedPointerKind> Clone for Trie<K, V, P> {
    fn clone(&self) -> Self {
        Self {
            root: SharedPointer::clone(&self.root),
            len: self.len,
        }
    }
}

// ---------------------------------------------------------------------------
// Iterator
// ---------------------------------------------------------------------------

/// Depth-first cursor over trie entries: inline entries first, then children.
///
/// Cloning copies one frame per trie level.
pub struct Iter<'a, K, V, P: SharedPointerKind> {
    stack: Vec<Frame<'a, K, V, P>>,
    remaining: usize,
}

struct Frame<'a, K, V, P: SharedPointerKind> {
    entries: slice::Iter<'a, Entry<K, V>>,
    children: slice::Iter<'a, Child<K, V, P>>,
}

impl<'a, K, V, P: SharedPointerKind> Iter<'a, K, V, P> {
    fn new(root: &'a Bitmap<K, V, P>, len: usize) -> Self {
        Self {
            stack: vec![Frame {
                entries: root.entries.iter(),
                children: root.children.iter(),
            }],
            remaining: len,
        }
    }
}

impl<'a, K, V, P: SharedPointerKind> Iterator for Iter<'a, K, V, P> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            if let Some(entry) = frame.entries.next() {
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            match frame.children.next() {
                Some(Child::Branch(node)) => self.stack.push(Frame {
                    entries: node.entries.iter(),
                    children: node.children.iter(),
                }),
                Some(Child::Collision(node)) => self.stack.push(Frame {
                    entries: node.entries.iter(),
                    children: Default::default(),
                }),
                None => {
                    self.stack.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, P: SharedPointerKind> ExactSizeIterator for Iter<'_, K, V, P> {}

impl<K, V, P: SharedPointerKind> Clone for Iter<'_, K, V, P> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            remaining: self.remaining,
        }
    }
}

impl<K, V, P: SharedPointerKind> Clone for Frame<'_, K, V, P> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            children: self.children.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Structure validation (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
impl<K, V, P: SharedPointerKind> Trie<K, V, P> {
    /// Walks the whole trie asserting every structural invariant and
    /// returns the number of entries found.
    pub fn check(&self) -> usize {
        let count = check_node(&self.root, 0);
        assert_eq!(count, self.len, "cached len diverged from entry count");
        count
    }
}

#[cfg(test)]
fn check_node<K, V, P: SharedPointerKind>(node: &Bitmap<K, V, P>, shift: u32) -> usize {
    use crate::node::{BITS_PER_LEVEL, fragment, index, mask};

    assert_eq!(node.data_map & node.node_map, 0, "overlapping bitmaps");
    assert_eq!(node.entries.len(), node.data_map.count_ones() as usize);
    assert_eq!(node.children.len(), node.node_map.count_ones() as usize);

    for entry in &node.entries {
        let bit = mask(fragment(entry.hash, shift));
        assert_ne!(node.data_map & bit, 0, "entry stored under a foreign slot");
        assert!(std::ptr::eq(&node.entries[index(node.data_map, bit)], entry));
    }

    let mut count = node.entries.len();
    for child in &node.children {
        assert!(child.single_entry().is_none(), "single-entry child not inlined");
        count += match child {
            Child::Branch(child) => {
                let n = check_node(child, shift + BITS_PER_LEVEL);
                assert!(n >= 2, "sub-trie with fewer than two entries");
                n
            }
            Child::Collision(child) => {
                assert!(child.entries.len() >= 2, "collision node with one entry");
                assert!(child.entries.iter().all(|e| e.hash == child.hash));
                child.entries.len()
            }
        };
    }
    count
}
