//! B-tree removal: predecessor promotion, then rotate or merge.

use std::mem;

use archery::SharedPointerKind;

use super::{Branch, Kind, Link, MIN_KEYS, Node, Seq, edit_child};
use crate::owner::{self, Epoch};

/// Removes `key` from the subtree behind `link`, returning its value.
///
/// A missing key leaves the subtree untouched. The node behind `link` may be
/// left under-full; its parent rebalances it.
pub fn remove_recursive<T, P>(link: &mut Link<T, P>, epoch: &mut Epoch, key: Seq) -> Option<T>
where
    T: Clone,
    P: SharedPointerKind,
{
    let pos = match link.keys.binary_search(&key) {
        Ok(pos) => return Some(remove_at(owner::to_owned(link, epoch), pos, epoch)),
        Err(pos) => pos,
    };

    let removed = edit_child(link, epoch, pos, |child, epoch| {
        remove_recursive(child, epoch, key)
    })?;

    let node = owner::to_owned(link, epoch);
    if let Kind::Internal(branch) = &mut node.kind {
        branch.size -= 1;
        rebalance(&mut node.keys, &mut node.values, branch, pos, epoch);
    }
    node.debug_check();
    Some(removed)
}

/// Removes the entry stored at `pos` of an owned node.
///
/// In an internal node the slot is refilled with the in-order predecessor,
/// the last entry of the left child.
fn remove_at<T, P>(node: &mut Node<T, P>, pos: usize, epoch: &mut Epoch) -> T
where
    T: Clone,
    P: SharedPointerKind,
{
    let removed = match &mut node.kind {
        Kind::Leaf => {
            node.keys.remove(pos);
            node.values.remove(pos)
        }
        Kind::Internal(branch) => {
            let (key, value) = remove_last(&mut branch.children[pos], epoch);
            node.keys[pos] = key;
            let removed = mem::replace(&mut node.values[pos], value);
            branch.size -= 1;
            rebalance(&mut node.keys, &mut node.values, branch, pos, epoch);
            removed
        }
    };
    node.debug_check();
    removed
}

/// Removes and returns the last (greatest) entry of the subtree.
fn remove_last<T, P>(link: &mut Link<T, P>, epoch: &mut Epoch) -> (Seq, T)
where
    T: Clone,
    P: SharedPointerKind,
{
    let node = owner::to_owned(link, epoch);
    let last = match &mut node.kind {
        Kind::Leaf => {
            let at = node.keys.len() - 1;
            (node.keys.remove(at), node.values.remove(at))
        }
        Kind::Internal(branch) => {
            let at = branch.children.len() - 1;
            let last = remove_last(&mut branch.children[at], epoch);
            branch.size -= 1;
            rebalance(&mut node.keys, &mut node.values, branch, at, epoch);
            last
        }
    };
    node.debug_check();
    last
}

// ---------------------------------------------------------------------------
// Rebalancing
// ---------------------------------------------------------------------------

/// Restores the minimum key count of child `pos` of an owned internal node.
///
/// Prefers rotating a key in from a left sibling with slack, then from a
/// right sibling, and merges with a sibling otherwise.
fn rebalance<T, P>(
    keys: &mut Vec<Seq>,
    values: &mut Vec<T>,
    branch: &mut Branch<T, P>,
    pos: usize,
    epoch: &mut Epoch,
) where
    T: Clone,
    P: SharedPointerKind,
{
    let children = &mut branch.children;
    if children[pos].keys.len() >= MIN_KEYS {
        return;
    }

    if pos > 0 && children[pos - 1].keys.len() > MIN_KEYS {
        rotate_right(keys, values, children, pos - 1, epoch);
    } else if pos + 1 < children.len() && children[pos + 1].keys.len() > MIN_KEYS {
        rotate_left(keys, values, children, pos, epoch);
    } else if pos > 0 {
        merge(keys, values, children, pos - 1, epoch);
    } else {
        merge(keys, values, children, pos, epoch);
    }

    debug_assert!(
        children.len() == 1 || children.iter().all(|c| c.keys.len() >= MIN_KEYS),
        "rebalance left an under-full child"
    );
}

/// Moves the last entry of `children[sep]` up into separator `sep` and the
/// old separator down to the front of `children[sep + 1]`.
fn rotate_right<T, P>(
    keys: &mut [Seq],
    values: &mut [T],
    children: &mut [Link<T, P>],
    sep: usize,
    epoch: &mut Epoch,
) where
    T: Clone,
    P: SharedPointerKind,
{
    let (left, right) = children.split_at_mut(sep + 1);
    let donor = owner::to_owned(&mut left[sep], epoch);
    let receiver = owner::to_owned(&mut right[0], epoch);

    let at = donor.keys.len() - 1;
    let key = mem::replace(&mut keys[sep], donor.keys.remove(at));
    let value = mem::replace(&mut values[sep], donor.values.remove(at));
    receiver.keys.insert(0, key);
    receiver.values.insert(0, value);

    if let (Kind::Internal(from), Kind::Internal(to)) = (&mut donor.kind, &mut receiver.kind) {
        if let Some(child) = from.children.pop() {
            to.children.insert(0, child);
        }
    }

    donor.recompute_size();
    receiver.recompute_size();
}

/// Moves the first entry of `children[sep + 1]` up into separator `sep` and
/// the old separator down to the end of `children[sep]`.
fn rotate_left<T, P>(
    keys: &mut [Seq],
    values: &mut [T],
    children: &mut [Link<T, P>],
    sep: usize,
    epoch: &mut Epoch,
) where
    T: Clone,
    P: SharedPointerKind,
{
    let (left, right) = children.split_at_mut(sep + 1);
    let receiver = owner::to_owned(&mut left[sep], epoch);
    let donor = owner::to_owned(&mut right[0], epoch);

    let key = mem::replace(&mut keys[sep], donor.keys.remove(0));
    let value = mem::replace(&mut values[sep], donor.values.remove(0));
    receiver.keys.push(key);
    receiver.values.push(value);

    if let (Kind::Internal(from), Kind::Internal(to)) = (&mut donor.kind, &mut receiver.kind) {
        let child = from.children.remove(0);
        to.children.push(child);
    }

    donor.recompute_size();
    receiver.recompute_size();
}

/// Folds separator `sep` and `children[sep + 1]` into `children[sep]`.
fn merge<T, P>(
    keys: &mut Vec<Seq>,
    values: &mut Vec<T>,
    children: &mut Vec<Link<T, P>>,
    sep: usize,
    epoch: &mut Epoch,
) where
    T: Clone,
    P: SharedPointerKind,
{
    let right = children.remove(sep + 1);
    let key = keys.remove(sep);
    let value = values.remove(sep);

    let left = owner::to_owned(&mut children[sep], epoch);
    left.keys.push(key);
    left.values.push(value);
    left.keys.extend_from_slice(&right.keys);
    left.values.extend(right.values.iter().cloned());
    if let (Kind::Internal(into), Kind::Internal(from)) = (&mut left.kind, &right.kind) {
        into.children.extend(from.children.iter().cloned());
    }
    left.recompute_size();
    left.debug_check();
}
