//! Snapshot iterator over live records.

use std::vec;

/// One-shot iterator over `(key, value)` pairs, oldest first.
///
/// The pairs are read in a single statement when the iterator is created,
/// so later writes to the store do not affect it.
#[derive(Debug)]
pub struct Items {
    inner: vec::IntoIter<(Vec<u8>, Vec<u8>)>,
}

impl Items {
    pub(crate) fn new(rows: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            inner: rows.into_iter(),
        }
    }

    /// An iterator yielding nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<(Vec<u8>, Vec<u8>)>> for Items {
    fn from(rows: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self::new(rows)
    }
}

impl Iterator for Items {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Items {}

impl DoubleEndedIterator for Items {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}
