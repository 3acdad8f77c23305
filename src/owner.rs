//! Owner tags: the copy-on-write choke point for every node.
//!
//! Each node remembers the [`Owner`] of the transaction that last mutated it.
//! A write that arrives with a different owner copies the node first; a write
//! from the same owner mutates it in place.

use std::sync::atomic::{AtomicU64, Ordering};

use archery::{SharedPointer, SharedPointerKind};

/// Next owner id. Zero is reserved for nodes no transaction owns.
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Opaque transaction token stored in every node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Owner(u64);

impl Owner {
    /// Tag of nodes built outside any transaction: empty roots and the
    /// output of `map` and `map_values`. No epoch ever owns it.
    pub const NONE: Self = Self(0);

    /// Issues a fresh, never reused owner id.
    pub fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The active owner of one top-level write or one builder.
///
/// A lazy epoch allocates its owner on the first copy, so a write that turns
/// out to be a no-op never draws an id.
#[derive(Debug)]
pub struct Epoch(Option<Owner>);

impl Epoch {
    /// Epoch whose owner is drawn on first use.
    pub const fn lazy() -> Self {
        Self(None)
    }

    /// Epoch bound to a fresh owner right away (builders).
    pub fn scoped() -> Self {
        Self(Some(Owner::next()))
    }

    /// Returns `true` if nodes tagged with `tag` belong to this epoch.
    pub fn owns(&self, tag: Owner) -> bool {
        self.0 == Some(tag)
    }

    /// Returns the epoch's owner, drawing one if needed.
    pub fn owner(&mut self) -> Owner {
        *self.0.get_or_insert_with(Owner::next)
    }
}

/// Node types that carry an owner tag.
pub trait Owned: Clone {
    /// Returns the node's owner tag.
    fn owner(&self) -> Owner;

    /// Retags the node.
    fn set_owner(&mut self, owner: Owner);
}

/// Returns a mutable view of the node behind `link`, copying it first unless
/// the epoch already owns it.
///
/// Nodes tagged with the active owner are only reachable through nodes with
/// the same tag, so `make_mut` finds them uniquely held and does not clone.
pub fn to_owned<'a, T, P>(link: &'a mut SharedPointer<T, P>, epoch: &mut Epoch) -> &'a mut T
where
    T: Owned,
    P: SharedPointerKind,
{
    if !epoch.owns(link.owner()) {
        let mut copy = T::clone(&**link);
        copy.set_owner(epoch.owner());
        *link = SharedPointer::new(copy);
    }
    SharedPointer::make_mut(link)
}
