//! Removal operation: owner-tagged path-copy delete with inlining.

use archery::SharedPointerKind;

use crate::node::{self, Bitmap, Child, Collision, Link};
use crate::owner::{self, Epoch};

use super::edit_child;

/// Removes `key` from the subtree behind `link`.
///
/// Returns the removed value, or `None` if the key was not present (the
/// subtree is then left exactly as it was).
pub fn remove_recursive<K, V, P>(
    link: &mut Link<Bitmap<K, V, P>, P>,
    epoch: &mut Epoch,
    hash: u32,
    key: &K,
    shift: u32,
) -> Option<V>
where
    K: Eq + Clone,
    V: Clone,
    P: SharedPointerKind,
{
    let bit = node::mask(node::fragment(hash, shift));

    if link.data_map & bit != 0 {
        let pos = node::index(link.data_map, bit);
        let entry = &link.entries[pos];
        if entry.hash != hash || entry.key != *key {
            return None;
        }
        let node = owner::to_owned(link, epoch);
        node.data_map &= !bit;
        let removed = node.entries.remove(pos);
        link.debug_check();
        return Some(removed.value);
    }

    if link.node_map & bit == 0 {
        return None;
    }

    let pos = node::index(link.node_map, bit);
    let removed = edit_child(link, epoch, pos, |child, epoch| match child {
        Child::Branch(child) => {
            remove_recursive(child, epoch, hash, key, shift + node::BITS_PER_LEVEL)
        }
        Child::Collision(child) => remove_from_collision(child, epoch, hash, key),
    })?;

    // A child left with a single entry is inlined back into this node.
    let inlined = link.children[pos].single_entry().cloned();
    if let Some(entry) = inlined {
        let node = owner::to_owned(link, epoch);
        node.children.remove(pos);
        node.node_map &= !bit;
        node.data_map |= bit;
        node.entries.insert(node::index(node.data_map, bit), entry);
    }

    link.debug_check();
    Some(removed)
}

// ---------------------------------------------------------------------------
// Collision node remove
// ---------------------------------------------------------------------------

fn remove_from_collision<K, V, P>(
    link: &mut Link<Collision<K, V>, P>,
    epoch: &mut Epoch,
    hash: u32,
    key: &K,
) -> Option<V>
where
    K: Eq + Clone,
    V: Clone,
    P: SharedPointerKind,
{
    if hash != link.hash {
        return None;
    }
    let pos = link.entries.iter().position(|e| e.key == *key)?;
    Some(owner::to_owned(link, epoch).entries.remove(pos).value)
}
