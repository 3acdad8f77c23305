//! Iterator types for [`ChampMap`](crate::ChampMap) and
//! [`OrderedMap`](crate::OrderedMap).
//!
//! Every iterator is lazy and cheap to clone: a clone copies one cursor per
//! tree level and then advances independently of the original.

use std::iter::FusedIterator;

use archery::SharedPointerKind;

use crate::btree;
use crate::champ;

/// Iterator over `(&K, &V)` pairs of a [`ChampMap`](crate::ChampMap), in
/// trie order.
pub struct Iter<'a, K, V, P: SharedPointerKind> {
    inner: champ::Iter<'a, K, V, P>,
}

impl<'a, K, V, P: SharedPointerKind> Iter<'a, K, V, P> {
    pub(crate) const fn new(inner: champ::Iter<'a, K, V, P>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V, P: SharedPointerKind> Iterator for Iter<'a, K, V, P> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Iterator over `(&K, &V)` pairs of an [`OrderedMap`](crate::OrderedMap),
/// in insertion order.
pub struct OrderedIter<'a, K, V, P: SharedPointerKind> {
    inner: btree::iter::Iter<'a, (K, V), P>,
}

impl<'a, K, V, P: SharedPointerKind> OrderedIter<'a, K, V, P> {
    pub(crate) const fn new(inner: btree::iter::Iter<'a, (K, V), P>) -> Self {
        Self { inner }
    }
}

impl<'a, K, V, P: SharedPointerKind> Iterator for OrderedIter<'a, K, V, P> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, (key, value))| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Iterator over the keys of a map.
pub struct Keys<I> {
    inner: I,
}

/// Iterator over the values of a map.
pub struct Values<I> {
    inner: I,
}

impl<I> Keys<I> {
    pub(crate) const fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I> Values<I> {
    pub(crate) const fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<'a, K: 'a, V: 'a, I: Iterator<Item = (&'a K, &'a V)>> Iterator for Keys<I> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K: 'a, V: 'a, I: Iterator<Item = (&'a K, &'a V)>> Iterator for Values<I> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

// ---------------------------------------------------------------------------
// Marker and clone impls: no bounds on K/V.
// ---------------------------------------------------------------------------

impl<K, V, P: SharedPointerKind> ExactSizeIterator for Iter<'_, K, V, P> {}
impl<K, V, P: SharedPointerKind> FusedIterator for Iter<'_, K, V, P> {}
impl<K, V, P: SharedPointerKind> ExactSizeIterator for OrderedIter<'_, K, V, P> {}
impl<K, V, P: SharedPointerKind> FusedIterator for OrderedIter<'_, K, V, P> {}
impl<'a, K: 'a, V: 'a, I> ExactSizeIterator for Keys<I> where
    I: ExactSizeIterator<Item = (&'a K, &'a V)>
{
}
impl<'a, K: 'a, V: 'a, I> ExactSizeIterator for Values<I> where
    I: ExactSizeIterator<Item = (&'a K, &'a V)>
{
}

impl<K, V, P: SharedPointerKind> Clone for Iter<'_, K, V, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V, P: SharedPointerKind> Clone for OrderedIter<'_, K, V, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I: Clone> Clone for Keys<I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I: Clone> Clone for Values<I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
