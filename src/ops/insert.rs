//! Insertion operation: owner-tagged path-copy insert.

use archery::{SharedPointer, SharedPointerKind};

use crate::node::{self, Bitmap, Child, Collision, Entry, Link};
use crate::owner::{self, Epoch, Owner};

use super::edit_child;

/// Outcome of an insert that changed the trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// A new key was added.
    Added,
    /// An existing key got a different value.
    Replaced,
}

/// Inserts `entry` into the subtree behind `link`.
///
/// Returns `None` when the key already maps to a value `eq` accepts as
/// equal; the subtree is then left exactly as it was.
pub fn insert_recursive<K, V, P>(
    link: &mut Link<Bitmap<K, V, P>, P>,
    epoch: &mut Epoch,
    entry: Entry<K, V>,
    shift: u32,
    eq: &impl Fn(&V, &V) -> bool,
) -> Option<Inserted>
where
    K: Eq + Clone,
    V: Clone,
    P: SharedPointerKind,
{
    let bit = node::mask(node::fragment(entry.hash, shift));

    let outcome = if link.data_map & bit != 0 {
        let pos = node::index(link.data_map, bit);
        let existing = &link.entries[pos];

        if existing.hash == entry.hash && existing.key == entry.key {
            // Same key → update value.
            if eq(&existing.value, &entry.value) {
                return None;
            }
            owner::to_owned(link, epoch).entries[pos].value = entry.value;
            Inserted::Replaced
        } else {
            // Different key at same position → push both into a subtree.
            let owner = epoch.owner();
            let node = owner::to_owned(link, epoch);
            let existing = node.entries.remove(pos);
            let subtree = create_subtree(existing, entry, shift + node::BITS_PER_LEVEL, owner);
            node.data_map &= !bit;
            node.node_map |= bit;
            node.children.insert(node::index(node.node_map, bit), subtree);
            Inserted::Added
        }
    } else if link.node_map & bit != 0 {
        // Position has child subtree → recurse.
        let pos = node::index(link.node_map, bit);
        edit_child(link, epoch, pos, |child, epoch| match child {
            Child::Branch(child) => {
                insert_recursive(child, epoch, entry, shift + node::BITS_PER_LEVEL, eq)
            }
            Child::Collision(child) => insert_into_collision(child, epoch, entry, eq),
        })?
    } else {
        // Position empty → add inline entry.
        let node = owner::to_owned(link, epoch);
        node.data_map |= bit;
        node.entries.insert(node::index(node.data_map, bit), entry);
        Inserted::Added
    };

    link.debug_check();
    Some(outcome)
}

// ---------------------------------------------------------------------------
// Collision node insert
// ---------------------------------------------------------------------------

fn insert_into_collision<K, V, P>(
    link: &mut Link<Collision<K, V>, P>,
    epoch: &mut Epoch,
    entry: Entry<K, V>,
    eq: &impl Fn(&V, &V) -> bool,
) -> Option<Inserted>
where
    K: Eq + Clone,
    V: Clone,
    P: SharedPointerKind,
{
    debug_assert_eq!(link.hash, entry.hash, "collision node reached with foreign hash");

    // Search for existing key.
    if let Some(pos) = link.entries.iter().position(|e| e.key == entry.key) {
        if eq(&link.entries[pos].value, &entry.value) {
            return None;
        }
        owner::to_owned(link, epoch).entries[pos].value = entry.value;
        return Some(Inserted::Replaced);
    }

    // Key not found → append.
    owner::to_owned(link, epoch).entries.push(entry);
    Some(Inserted::Added)
}

// ---------------------------------------------------------------------------
// Subtree creation
// ---------------------------------------------------------------------------

/// Creates a subtree from two entries that collide at the current depth.
///
/// Recursively descends until hash fragments differ, or creates a collision
/// node once the hash code is exhausted.
fn create_subtree<K, V, P>(
    e1: Entry<K, V>,
    e2: Entry<K, V>,
    shift: u32,
    owner: Owner,
) -> Child<K, V, P>
where
    P: SharedPointerKind,
{
    if shift > node::MAX_SHIFT {
        return Child::Collision(SharedPointer::new(Collision {
            owner,
            hash: e1.hash,
            entries: vec![e1, e2],
        }));
    }

    let f1 = node::fragment(e1.hash, shift);
    let f2 = node::fragment(e2.hash, shift);

    let mut node = Bitmap::empty(owner);
    if f1 == f2 {
        node.node_map = node::mask(f1);
        node.children
            .push(create_subtree(e1, e2, shift + node::BITS_PER_LEVEL, owner));
    } else {
        node.data_map = node::mask(f1) | node::mask(f2);
        node.entries = if f1 < f2 { vec![e1, e2] } else { vec![e2, e1] };
    }
    Child::Branch(SharedPointer::new(node))
}
