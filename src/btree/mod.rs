//! Compact order-32 B-tree keyed by sequence ids.
//!
//! Unlike a textbook B+-tree every separator in an internal node carries its
//! own value, so in-order traversal visits internal slots between children.
//! Internal nodes cache their subtree size.

use archery::{SharedPointer, SharedPointerKind};

use crate::owner::{self, Epoch, Owned, Owner};

pub mod insert;
pub mod iter;
pub mod remove;

/// Sequence id, the B-tree's key.
pub type Seq = u64;

/// Maximum number of keys per node.
pub const MAX_KEYS: usize = 31;

/// Minimum number of keys per non-root node.
pub const MIN_KEYS: usize = 15;

/// Shared pointer to a B-tree node.
pub type Link<T, P> = SharedPointer<Node<T, P>, P>;

/// B-tree node: sorted keys with their values, plus children if internal.
pub struct Node<T, P: SharedPointerKind> {
    pub owner: Owner,
    pub keys: Vec<Seq>,
    pub values: Vec<T>,
    pub kind: Kind<T, P>,
}

pub enum Kind<T, P: SharedPointerKind> {
    Leaf,
    Internal(Branch<T, P>),
}

/// Children of an internal node: `children.len() == keys.len() + 1`.
pub struct Branch<T, P: SharedPointerKind> {
    pub children: Vec<Link<T, P>>,
    /// Entries in the whole subtree, including the node's own keys.
    pub size: usize,
}

impl<T, P: SharedPointerKind> Node<T, P> {
    pub const fn leaf(owner: Owner) -> Self {
        Self {
            owner,
            keys: Vec::new(),
            values: Vec::new(),
            kind: Kind::Leaf,
        }
    }

    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, Kind::Leaf)
    }

    /// Number of entries in the subtree rooted here.
    pub fn len(&self) -> usize {
        match &self.kind {
            Kind::Leaf => self.keys.len(),
            Kind::Internal(branch) => branch.size,
        }
    }

    /// Recomputes the cached size from the children.
    pub fn recompute_size(&mut self) {
        if let Kind::Internal(branch) = &mut self.kind {
            branch.size = self.keys.len() + branch.children.iter().map(|c| c.len()).sum::<usize>();
        }
    }

    /// Checks the node's local invariants.
    pub fn debug_check(&self) {
        debug_assert_eq!(self.keys.len(), self.values.len());
        debug_assert!(self.keys.len() <= MAX_KEYS, "overfull node");
        if let Kind::Internal(branch) = &self.kind {
            debug_assert_eq!(branch.children.len(), self.keys.len() + 1);
            debug_assert_eq!(
                branch.size,
                self.keys.len() + branch.children.iter().map(|c| c.len()).sum::<usize>(),
                "cached size diverged from children"
            );
        }
    }

    fn first(&self) -> Option<(Seq, &T)> {
        match &self.kind {
            Kind::Leaf => Some((*self.keys.first()?, self.values.first()?)),
            Kind::Internal(branch) => branch.children.first()?.first(),
        }
    }

    fn last(&self) -> Option<(Seq, &T)> {
        match &self.kind {
            Kind::Leaf => Some((*self.keys.last()?, self.values.last()?)),
            Kind::Internal(branch) => branch.children.last()?.last(),
        }
    }

    fn get(&self, key: Seq) -> Option<&T> {
        match (self.keys.binary_search(&key), &self.kind) {
            (Ok(pos), _) => Some(&self.values[pos]),
            (Err(_), Kind::Leaf) => None,
            (Err(pos), Kind::Internal(branch)) => branch.children[pos].get(key),
        }
    }
}

/// Runs `edit` on child `pos` of the internal node behind `link`.
///
/// Mirrors the trie's helper: the parent is copied only if `edit` reports a
/// change. Leaves have no children and report no change.
fn edit_child<T, P, R>(
    link: &mut Link<T, P>,
    epoch: &mut Epoch,
    pos: usize,
    edit: impl FnOnce(&mut Link<T, P>, &mut Epoch) -> Option<R>,
) -> Option<R>
where
    T: Clone,
    P: SharedPointerKind,
{
    if epoch.owns(link.owner) {
        let Kind::Internal(branch) = &mut SharedPointer::make_mut(link).kind else {
            return None;
        };
        return edit(&mut branch.children[pos], epoch);
    }
    let Kind::Internal(branch) = &link.kind else {
        return None;
    };
    let mut child = SharedPointer::clone(&branch.children[pos]);
    let outcome = edit(&mut child, epoch)?;
    if let Kind::Internal(branch) = &mut owner::to_owned(link, epoch).kind {
        branch.children[pos] = child;
    }
    Some(outcome)
}

// ---------------------------------------------------------------------------
// Tree root
// ---------------------------------------------------------------------------

/// A B-tree root. Its `len` is the number of entries in the tree.
pub struct Tree<T, P: SharedPointerKind> {
    pub root: Link<T, P>,
}

impl<T, P: SharedPointerKind> Tree<T, P> {
    pub fn new() -> Self {
        Self {
            root: SharedPointer::new(Node::leaf(Owner::NONE)),
        }
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn get(&self, key: Seq) -> Option<&T> {
        self.root.get(key)
    }

    pub fn first(&self) -> Option<(Seq, &T)> {
        self.root.first()
    }

    pub fn last(&self) -> Option<(Seq, &T)> {
        self.root.last()
    }

    pub fn iter(&self) -> iter::Iter<'_, T, P> {
        iter::Iter::new(&self.root)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        SharedPointer::ptr_eq(&self.root, &other.root)
    }

    /// Rebuilds the tree with values of a new type, keeping every key and
    /// the tree shape.
    pub fn map<U, F>(&self, owner: Owner, mut f: F) -> Tree<U, P>
    where
        F: FnMut(&T) -> U,
    {
        Tree {
            root: SharedPointer::new(map_node(&self.root, owner, &mut f)),
        }
    }
}

impl<T: Clone, P: SharedPointerKind> Tree<T, P> {
    /// Inserts or replaces `key`. `eq` decides whether a replacement is a
    /// no-op. Returns `false` if the tree did not change.
    pub fn insert(
        &mut self,
        epoch: &mut Epoch,
        key: Seq,
        value: T,
        eq: &impl Fn(&T, &T) -> bool,
    ) -> bool {
        match insert::insert_recursive(&mut self.root, epoch, key, value, eq) {
            None => false,
            Some(insert::Inserted::Split { key, value, right }) => {
                let left = SharedPointer::clone(&self.root);
                let mut root = Node {
                    owner: epoch.owner(),
                    keys: vec![key],
                    values: vec![value],
                    kind: Kind::Internal(Branch {
                        children: vec![left, right],
                        size: 0,
                    }),
                };
                root.recompute_size();
                self.root = SharedPointer::new(root);
                true
            }
            Some(_) => true,
        }
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, epoch: &mut Epoch, key: Seq) -> Option<T> {
        let removed = remove::remove_recursive(&mut self.root, epoch, key)?;
        // An internal root emptied by a merge gives way to its only child.
        let collapsed = match &self.root.kind {
            Kind::Internal(branch) if self.root.keys.is_empty() => branch.children.first().cloned(),
            _ => None,
        };
        if let Some(child) = collapsed {
            self.root = child;
        }
        Some(removed)
    }

    /// Maps values without changing their type; shares every subtree whose
    /// values all stay the same. `f` returns `None` for "unchanged".
    pub fn map_values<F>(&self, owner: Owner, mut f: F) -> Self
    where
        F: FnMut(&T) -> Option<T>,
    {
        map_node_values(&self.root, owner, &mut f).map_or_else(|| self.clone(), |root| Self { root })
    }
}

impl<T, P: SharedPointerKind> Clone for Tree<T, P> {
    fn clone(&self) -> Self {
        Self {
            root: SharedPointer::clone(&self.root),
        }
    }
}

/// Calls `f` on every value in key order: child `i`, then value `i`, then
/// the last child.
fn map_node<T, U, P, F>(node: &Node<T, P>, owner: Owner, f: &mut F) -> Node<U, P>
where
    P: SharedPointerKind,
    F: FnMut(&T) -> U,
{
    let mut values = Vec::with_capacity(node.values.len());
    let kind = match &node.kind {
        Kind::Leaf => {
            values.extend(node.values.iter().map(&mut *f));
            Kind::Leaf
        }
        Kind::Internal(branch) => {
            let mut children = Vec::with_capacity(branch.children.len());
            for (i, child) in branch.children.iter().enumerate() {
                children.push(SharedPointer::new(map_node(child, owner, &mut *f)));
                if let Some(value) = node.values.get(i) {
                    values.push(f(value));
                }
            }
            Kind::Internal(Branch {
                children,
                size: branch.size,
            })
        }
    };
    Node {
        owner,
        keys: node.keys.clone(),
        values,
        kind,
    }
}

/// Same visiting order as [`map_node`]; copies `node` only once something
/// below or in it changes.
fn map_node_values<T, P, F>(node: &Node<T, P>, owner: Owner, f: &mut F) -> Option<Link<T, P>>
where
    T: Clone,
    P: SharedPointerKind,
    F: FnMut(&T) -> Option<T>,
{
    let mut copy: Option<Node<T, P>> = None;
    let retag = || {
        let mut copy = node.clone();
        copy.owner = owner;
        copy
    };
    let children: &[Link<T, P>] = match &node.kind {
        Kind::Internal(branch) => &branch.children,
        Kind::Leaf => &[],
    };

    for i in 0..=node.values.len() {
        if let Some(mapped) = children
            .get(i)
            .and_then(|child| map_node_values(child, owner, &mut *f))
        {
            let copied = copy.get_or_insert_with(retag);
            if let Kind::Internal(branch) = &mut copied.kind {
                branch.children[i] = mapped;
            }
        }
        if let Some(mapped) = node.values.get(i).and_then(&mut *f) {
            copy.get_or_insert_with(retag).values[i] = mapped;
        }
    }

    copy.map(SharedPointer::new)
}

// ---------------------------------------------------------------------------
// Manual trait impls: avoid false `P: Clone` bounds.
// ---------------------------------------------------------------------------

impl<T: Clone, P: SharedPointerKind> Clone for Node<T, P> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner,
            keys: self.keys.clone(),
            values: self.values.clone(),
            kind: match &self.kind {
                Kind::Leaf => Kind::Leaf,
                Kind::Internal(branch) => Kind::Internal(Branch {
                    children: branch.children.clone(),
                    size: branch.size,
                }),
            },
        }
    }
}

impl<T: Clone, P: SharedPointerKind> Owned for Node<T, P> {
    fn owner(&self) -> Owner {
        self.owner
    }

    fn set_owner(&mut self, owner: Owner) {
        self.owner = owner;
    }
}

// ---------------------------------------------------------------------------
// Structure validation (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
impl<T, P: SharedPointerKind> Tree<T, P> {
    /// Walks the whole tree asserting key order, key-count bounds, child
    /// counts, uniform leaf depth and cached sizes. Returns the entry count.
    pub fn check(&self) -> usize {
        let mut leaf_depth = None;
        let count = check_node(&self.root, true, 0, &mut leaf_depth, None, None);
        assert_eq!(count, self.len(), "root len diverged from entry count");
        count
    }
}

#[cfg(test)]
fn check_node<T, P: SharedPointerKind>(
    node: &Node<T, P>,
    is_root: bool,
    depth: usize,
    leaf_depth: &mut Option<usize>,
    lower: Option<Seq>,
    upper: Option<Seq>,
) -> usize {
    assert_eq!(node.keys.len(), node.values.len());
    assert!(node.keys.len() <= MAX_KEYS, "node has {} keys", node.keys.len());
    if !is_root {
        assert!(node.keys.len() >= MIN_KEYS, "node has {} keys", node.keys.len());
    }
    assert!(node.keys.windows(2).all(|w| w[0] < w[1]), "keys out of order");
    if let (Some(lower), Some(&first)) = (lower, node.keys.first()) {
        assert!(first > lower);
    }
    if let (Some(upper), Some(&last)) = (upper, node.keys.last()) {
        assert!(last < upper);
    }

    match &node.kind {
        Kind::Leaf => {
            assert_eq!(*leaf_depth.get_or_insert(depth), depth, "leaves at uneven depth");
            node.keys.len()
        }
        Kind::Internal(branch) => {
            assert!(!node.keys.is_empty(), "internal node without keys");
            assert_eq!(branch.children.len(), node.keys.len() + 1);
            let mut count = node.keys.len();
            for (i, child) in branch.children.iter().enumerate() {
                let lo = if i == 0 { lower } else { Some(node.keys[i - 1]) };
                let hi = node.keys.get(i).copied().or(upper);
                count += check_node(child, false, depth + 1, leaf_depth, lo, hi);
            }
            assert_eq!(branch.size, count, "cached size diverged");
            count
        }
    }
}
