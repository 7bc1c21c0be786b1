//! In-order traversal over populated indices.
//!
//! Traversal keeps no stack: a [`Cursor`] names a leaf, and the next leaf is
//! found by resuming the scan of that leaf's block one slot further on,
//! climbing to the parent whenever a block is exhausted.

use std::iter::FusedIterator;

use crate::block::LeafId;
use crate::index::TrieIndex;
use crate::XArray;

/// Position of one populated index.
///
/// A cursor is a plain copyable id. Any insert, unset or clear on the array
/// invalidates every outstanding cursor; using a stale cursor is a logic
/// error. It never causes memory unsafety, but lookups through it may return
/// `None` or a different entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cursor<I> {
    pub(crate) leaf: LeafId,
    pub(crate) index: I,
}

impl<I: Copy> Cursor<I> {
    /// Index of the entry this cursor points at.
    #[inline]
    pub fn index(&self) -> I {
        self.index
    }
}

/// Iterator over `(index, &value)` pairs in ascending index order.
pub struct Iter<'a, T, I: TrieIndex> {
    pub(crate) array: &'a XArray<T, I>,
    pub(crate) next: Option<Cursor<I>>,
    pub(crate) remaining: usize,
}

impl<'a, T, I: TrieIndex> Iterator for Iter<'a, T, I> {
    type Item = (I, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let array = self.array;
        while let Some(cursor) = self.next.take() {
            self.next = array.next_after(cursor);
            if let Some(value) = array.value(cursor) {
                self.remaining = self.remaining.saturating_sub(1);
                return Some((cursor.index, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, I: TrieIndex> ExactSizeIterator for Iter<'_, T, I> {}

impl<T, I: TrieIndex> FusedIterator for Iter<'_, T, I> {}

/// Iterator over populated indices in ascending order.
pub struct Keys<'a, T, I: TrieIndex> {
    pub(crate) inner: Iter<'a, T, I>,
}

impl<T, I: TrieIndex> Iterator for Keys<'_, T, I> {
    type Item = I;

    #[inline]
    fn next(&mut self) -> Option<I> {
        self.inner.next().map(|(index, _)| index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, I: TrieIndex> ExactSizeIterator for Keys<'_, T, I> {}

impl<T, I: TrieIndex> FusedIterator for Keys<'_, T, I> {}

/// Iterator over values in ascending index order.
pub struct Values<'a, T, I: TrieIndex> {
    pub(crate) inner: Iter<'a, T, I>,
}

impl<'a, T, I: TrieIndex> Iterator for Values<'a, T, I> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, I: TrieIndex> ExactSizeIterator for Values<'_, T, I> {}

impl<T, I: TrieIndex> FusedIterator for Values<'_, T, I> {}

impl<'a, T, I: TrieIndex> IntoIterator for &'a XArray<T, I> {
    type Item = (I, &'a T);
    type IntoIter = Iter<'a, T, I>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
