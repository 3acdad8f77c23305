//! In-order B-tree cursor.

use archery::SharedPointerKind;

use super::{Kind, Node, Seq};

/// In-order iterator over `(sequence id, value)` pairs.
///
/// Keeps one cursor per level; cloning copies the stack, so the cost is
/// proportional to tree depth.
pub struct Iter<'a, T, P: SharedPointerKind> {
    stack: Vec<Cursor<'a, T, P>>,
    remaining: usize,
}

struct Cursor<'a, T, P: SharedPointerKind> {
    node: &'a Node<T, P>,
    /// Index of the next key to yield from `node`.
    pos: usize,
}

impl<'a, T, P: SharedPointerKind> Iter<'a, T, P> {
    pub fn new(root: &'a Node<T, P>) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            remaining: root.len(),
        };
        iter.descend(root);
        iter
    }

    /// Pushes the leftmost path below `node`.
    fn descend(&mut self, mut node: &'a Node<T, P>) {
        loop {
            self.stack.push(Cursor { node, pos: 0 });
            match &node.kind {
                Kind::Leaf => break,
                Kind::Internal(branch) => node = &*branch.children[0],
            }
        }
    }
}

impl<'a, T, P: SharedPointerKind> Iterator for Iter<'a, T, P> {
    type Item = (Seq, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cursor = self.stack.last_mut()?;
            let node = cursor.node;
            let pos = cursor.pos;
            if pos < node.keys.len() {
                cursor.pos += 1;
                if let Kind::Internal(branch) = &node.kind {
                    self.descend(&branch.children[pos + 1]);
                }
                self.remaining -= 1;
                return Some((node.keys[pos], &node.values[pos]));
            }
            self.stack.pop();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, P: SharedPointerKind> ExactSizeIterator for Iter<'_, T, P> {}

impl<T, P: SharedPointerKind> Clone for Iter<'_, T, P> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            remaining: self.remaining,
        }
    }
}

impl<T, P: SharedPointerKind> Clone for Cursor<'_, T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, P: SharedPointerKind> Copy for Cursor<'_, T, P> {}
