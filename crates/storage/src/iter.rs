//! Point-in-time iteration over queue contents

use std::iter::FusedIterator;

/// Elements of a queue as they were when the iterator was created.
///
/// All elements are read and decoded inside one read transaction, so later
/// pushes and pops never show up here. The iterator is consumed as it goes
/// and cannot be restarted; call `iter()` again for a fresh view.
#[derive(Debug)]
pub struct SnapshotIter<T> {
    inner: std::vec::IntoIter<T>,
}

impl<T> SnapshotIter<T> {
    pub(crate) fn new(elements: Vec<T>) -> Self {
        SnapshotIter {
            inner: elements.into_iter(),
        }
    }
}

impl<T> Iterator for SnapshotIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for SnapshotIter<T> {}

impl<T> FusedIterator for SnapshotIter<T> {}
