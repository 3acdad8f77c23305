//! Value mapping: identity-preserving and type-changing.

use archery::{SharedPointer, SharedPointerKind};

use crate::node::{Bitmap, Child, Collision, Entry, Link};
use crate::owner::Owner;

/// Maps every value of the subtree with `f`.
///
/// Returns `None` if every mapped value equals its original, in which case
/// the caller keeps the original node. Changed nodes are copied once and
/// tagged with `owner`; unchanged children stay shared.
pub fn map_values_recursive<K, V, P, F>(
    node: &Bitmap<K, V, P>,
    owner: Owner,
    f: &mut F,
) -> Option<Link<Bitmap<K, V, P>, P>>
where
    K: Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    F: FnMut(&K, &V) -> V,
{
    let mut copy: Option<Bitmap<K, V, P>> = None;

    for (i, entry) in node.entries.iter().enumerate() {
        let value = f(&entry.key, &entry.value);
        if value != entry.value {
            copy.get_or_insert_with(|| retag(node, owner)).entries[i].value = value;
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        let mapped = match child {
            Child::Branch(child) => map_values_recursive(child, owner, f).map(Child::Branch),
            Child::Collision(child) => map_collision_values(child, owner, f).map(Child::Collision),
        };
        if let Some(mapped) = mapped {
            copy.get_or_insert_with(|| retag(node, owner)).children[i] = mapped;
        }
    }

    copy.map(SharedPointer::new)
}

fn map_collision_values<K, V, P, F>(
    node: &Collision<K, V>,
    owner: Owner,
    f: &mut F,
) -> Option<Link<Collision<K, V>, P>>
where
    K: Clone,
    V: PartialEq + Clone,
    P: SharedPointerKind,
    F: FnMut(&K, &V) -> V,
{
    let mut copy: Option<Collision<K, V>> = None;
    for (i, entry) in node.entries.iter().enumerate() {
        let value = f(&entry.key, &entry.value);
        if value != entry.value {
            copy.get_or_insert_with(|| Collision {
                owner,
                hash: node.hash,
                entries: node.entries.clone(),
            })
            .entries[i]
                .value = value;
        }
    }
    copy.map(SharedPointer::new)
}

fn retag<K: Clone, V: Clone, P: SharedPointerKind>(
    node: &Bitmap<K, V, P>,
    owner: Owner,
) -> Bitmap<K, V, P> {
    let mut copy = node.clone();
    copy.owner = owner;
    copy
}

/// Rebuilds the subtree with values of a new type, keeping every bitmap.
pub fn map_recursive<K, V, W, P, F>(node: &Bitmap<K, V, P>, owner: Owner, f: &mut F) -> Bitmap<K, W, P>
where
    K: Clone,
    P: SharedPointerKind,
    F: FnMut(&K, &V) -> W,
{
    Bitmap {
        owner,
        data_map: node.data_map,
        node_map: node.node_map,
        entries: map_entries(&node.entries, &mut *f),
        children: node
            .children
            .iter()
            .map(|child| match child {
                Child::Branch(child) => {
                    Child::Branch(SharedPointer::new(map_recursive(child, owner, &mut *f)))
                }
                Child::Collision(child) => Child::Collision(SharedPointer::new(Collision {
                    owner,
                    hash: child.hash,
                    entries: map_entries(&child.entries, &mut *f),
                })),
            })
            .collect(),
    }
}

fn map_entries<K: Clone, V, W>(
    entries: &[Entry<K, V>],
    f: &mut impl FnMut(&K, &V) -> W,
) -> Vec<Entry<K, W>> {
    entries
        .iter()
        .map(|e| Entry {
            hash: e.hash,
            key: e.key.clone(),
            value: f(&e.key, &e.value),
        })
        .collect()
}
