//! B-tree insertion with node splitting.

use archery::{SharedPointer, SharedPointerKind};

use super::{Branch, Kind, Link, MAX_KEYS, Node, Seq, edit_child};
use crate::owner::{self, Epoch, Owner};

/// Outcome of an insert that changed the subtree.
pub enum Inserted<T, P: SharedPointerKind> {
    /// An existing key got a different value.
    Replaced,
    /// A new key was added and the node still fits.
    Added,
    /// A new key was added and the node overflowed: the node behind the
    /// link kept the left half, `key`/`value` is the median to push up.
    Split {
        key: Seq,
        value: T,
        right: Link<T, P>,
    },
}

/// Inserts `key → value` into the subtree behind `link`.
///
/// Returns `None` if `key` is present and `eq` says its value is unchanged.
pub fn insert_recursive<T, P>(
    link: &mut Link<T, P>,
    epoch: &mut Epoch,
    key: Seq,
    value: T,
    eq: &impl Fn(&T, &T) -> bool,
) -> Option<Inserted<T, P>>
where
    T: Clone,
    P: SharedPointerKind,
{
    let pos = match link.keys.binary_search(&key) {
        Ok(pos) => {
            if eq(&link.values[pos], &value) {
                return None;
            }
            owner::to_owned(link, epoch).values[pos] = value;
            return Some(Inserted::Replaced);
        }
        Err(pos) => pos,
    };

    if link.is_leaf() {
        let node = owner::to_owned(link, epoch);
        node.keys.insert(pos, key);
        node.values.insert(pos, value);
    } else {
        let outcome = edit_child(link, epoch, pos, |child, epoch| {
            insert_recursive(child, epoch, key, value, eq)
        })?;
        let node = owner::to_owned(link, epoch);
        match outcome {
            Inserted::Replaced => return Some(Inserted::Replaced),
            Inserted::Added => {}
            Inserted::Split { key, value, right } => {
                node.keys.insert(pos, key);
                node.values.insert(pos, value);
                if let Kind::Internal(branch) = &mut node.kind {
                    branch.children.insert(pos + 1, right);
                }
            }
        }
        if let Kind::Internal(branch) = &mut node.kind {
            branch.size += 1;
        }
    }

    if link.keys.len() > MAX_KEYS {
        let owner = epoch.owner();
        return Some(split(owner::to_owned(link, epoch), owner));
    }
    link.debug_check();
    Some(Inserted::Added)
}

/// Splits an overfull node in half, keeping the left half in place.
fn split<T, P: SharedPointerKind>(node: &mut Node<T, P>, owner: Owner) -> Inserted<T, P> {
    let mid = node.keys.len() / 2;
    let right_keys = node.keys.split_off(mid + 1);
    let right_values = node.values.split_off(mid + 1);
    let key = node.keys.remove(mid);
    let value = node.values.remove(mid);

    let kind = match &mut node.kind {
        Kind::Leaf => Kind::Leaf,
        Kind::Internal(branch) => Kind::Internal(Branch {
            children: branch.children.split_off(mid + 1),
            size: 0,
        }),
    };
    let mut right = Node {
        owner,
        keys: right_keys,
        values: right_values,
        kind,
    };
    right.recompute_size();
    node.recompute_size();
    node.debug_check();
    right.debug_check();

    Inserted::Split {
        key,
        value,
        right: SharedPointer::new(right),
    }
}
