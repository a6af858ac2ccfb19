//! Enumeration that counts as reading

use std::collections::hash_map;
use std::collections::HashSet;
use std::iter::FusedIterator;

use serde_json::Value;

use super::Slot;
use crate::key::FoldedKey;

/// Iterator over the live entries of a [`TempData`](crate::TempData).
///
/// Each key is marked as read at the moment it is yielded, so a partially
/// consumed iterator only marks the entries it actually produced.
pub struct Entries<'a> {
    inner: hash_map::Iter<'a, FoldedKey, Slot>,
    unread: &'a mut HashSet<FoldedKey>,
}

impl<'a> Entries<'a> {
    pub(super) fn new(
        inner: hash_map::Iter<'a, FoldedKey, Slot>,
        unread: &'a mut HashSet<FoldedKey>,
    ) -> Self {
        Self { inner, unread }
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let (folded, slot) = self.inner.next()?;
        self.unread.remove(folded);
        Some((slot.key.as_str(), &slot.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl FusedIterator for Entries<'_> {}
