//! CHAMP trie algorithms.
//!
//! Every write walks down with the active [`Epoch`] and only copies the nodes
//! on the path it actually changes.

use archery::{SharedPointer, SharedPointerKind};

use crate::node::{Bitmap, Child, Link};
use crate::owner::{self, Epoch};

pub mod get;
pub mod insert;
pub mod map;
pub mod remove;

/// Runs `edit` on child `pos` of the node behind `link`.
///
/// An owned parent is edited in place. Otherwise the child is edited through
/// a detached pointer and the parent is copied only if `edit` reports a
/// change (`Some`), so a no-op leaves the whole path untouched.
fn edit_child<K, V, P, R>(
    link: &mut Link<Bitmap<K, V, P>, P>,
    epoch: &mut Epoch,
    pos: usize,
    edit: impl FnOnce(&mut Child<K, V, P>, &mut Epoch) -> Option<R>,
) -> Option<R>
where
    K: Clone,
    V: Clone,
    P: SharedPointerKind,
{
    if epoch.owns(link.owner) {
        let node = SharedPointer::make_mut(link);
        return edit(&mut node.children[pos], epoch);
    }
    let mut child = link.children[pos].clone();
    let outcome = edit(&mut child, epoch)?;
    owner::to_owned(link, epoch).children[pos] = child;
    Some(outcome)
}
