//! Lookup operation: traverses the trie to find a key.

use archery::SharedPointerKind;

use crate::node::{self, Bitmap, Child, Collision};

/// Searches for `key` in the subtree rooted at `node`.
///
/// Returns a reference to the value if found.
pub fn get_recursive<'a, K, V, P>(
    node: &'a Bitmap<K, V, P>,
    hash: u32,
    key: &K,
    shift: u32,
) -> Option<&'a V>
where
    K: Eq,
    P: SharedPointerKind,
{
    let bit = node::mask(node::fragment(hash, shift));

    if node.data_map & bit != 0 {
        // Position has an inline entry.
        let entry = &node.entries[node::index(node.data_map, bit)];
        if entry.hash == hash && entry.key == *key {
            Some(&entry.value)
        } else {
            None
        }
    } else if node.node_map & bit != 0 {
        // Position has a child subtree, recurse.
        match &node.children[node::index(node.node_map, bit)] {
            Child::Branch(child) => {
                get_recursive(child, hash, key, shift + node::BITS_PER_LEVEL)
            }
            Child::Collision(child) => get_collision(child, hash, key),
        }
    } else {
        None
    }
}

/// Linear search through a collision node.
fn get_collision<'a, K: Eq, V>(node: &'a Collision<K, V>, hash: u32, key: &K) -> Option<&'a V> {
    if hash != node.hash {
        return None;
    }
    node.entries
        .iter()
        .find(|entry| entry.key == *key)
        .map(|entry| &entry.value)
}
