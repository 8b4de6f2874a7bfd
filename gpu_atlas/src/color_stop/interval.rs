// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Best-fit allocation of intervals along one row.

use alloc::collections::{BTreeMap, BTreeSet};

/// Allocates `[begin, end)` intervals out of `[0, size)`.
///
/// Allocation takes the smallest free interval that is large enough,
/// preferring the leftmost among equals. Freed intervals merge with free
/// neighbours on both sides.
#[derive(Clone, Debug)]
pub(crate) struct IntervalAllocator {
    size: u32,
    /// Free intervals, `end -> begin`.
    free: BTreeMap<u32, u32>,
    /// Ends of the free intervals of each length.
    by_len: BTreeMap<u32, BTreeSet<u32>>,
}

impl IntervalAllocator {
    pub(crate) fn new(size: u32) -> Self {
        let mut allocator = Self {
            size,
            free: BTreeMap::new(),
            by_len: BTreeMap::new(),
        };
        if size > 0 {
            allocator.insert(0, size);
        }
        allocator
    }

    /// Length of the largest free interval.
    pub(crate) fn largest_free(&self) -> u32 {
        self.by_len.last_key_value().map_or(0, |(&len, _)| len)
    }

    /// Returns the start of a freshly allocated `len` interval.
    pub(crate) fn allocate(&mut self, len: u32) -> Option<u32> {
        if len == 0 {
            return None;
        }
        let (_, ends) = self.by_len.range(len..).next()?;
        let end = *ends.first()?;
        let begin = *self.free.get(&end)?;
        self.remove(begin, end);
        if begin + len < end {
            self.insert(begin + len, end);
        }
        Some(begin)
    }

    /// Returns `[begin, begin + len)` to the free pool.
    ///
    /// The interval must be fully allocated.
    pub(crate) fn free(&mut self, begin: u32, len: u32) {
        debug_assert!(len > 0, "freeing an empty interval");
        let mut end = begin + len;
        debug_assert!(end <= self.size, "interval past the end of the row");
        debug_assert!(
            self.is_allocated(begin, end),
            "freeing [{begin}, {end}) which is not fully allocated"
        );
        let mut begin = begin;
        if let Some(&left) = self.free.get(&begin) {
            self.remove(left, begin);
            begin = left;
        }
        if let Some((&right_end, &right_begin)) = self.free.range(end + 1..).next() {
            if right_begin == end {
                self.remove(right_begin, right_end);
                end = right_end;
            }
        }
        self.insert(begin, end);
    }

    fn is_allocated(&self, begin: u32, end: u32) -> bool {
        // The first free interval ending after `begin` must start at or
        // after `end`.
        self.free
            .range(begin + 1..)
            .next()
            .is_none_or(|(_, &free_begin)| free_begin >= end)
    }

    fn insert(&mut self, begin: u32, end: u32) {
        self.free.insert(end, begin);
        self.by_len.entry(end - begin).or_default().insert(end);
    }

    fn remove(&mut self, begin: u32, end: u32) {
        self.free.remove(&end);
        let len = end - begin;
        if let Some(ends) = self.by_len.get_mut(&len) {
            ends.remove(&end);
            if ends.is_empty() {
                self.by_len.remove(&len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_left_to_right() {
        let mut row = IntervalAllocator::new(10);
        assert_eq!(row.allocate(3), Some(0));
        assert_eq!(row.allocate(3), Some(3));
        assert_eq!(row.largest_free(), 4);
        assert_eq!(row.allocate(5), None);
        assert_eq!(row.allocate(0), None);
    }

    #[test]
    fn best_fit_prefers_the_smallest_hole() {
        let mut row = IntervalAllocator::new(20);
        let a = row.allocate(4).unwrap();
        let _b = row.allocate(2).unwrap();
        let c = row.allocate(3).unwrap();
        let _d = row.allocate(1).unwrap();
        row.free(a, 4);
        row.free(c, 3);
        // Holes: [0, 4), [6, 9), [10, 20).
        assert_eq!(row.allocate(3), Some(6));
        assert_eq!(row.allocate(4), Some(0));
    }

    #[test]
    fn frees_coalesce_with_neighbours() {
        let mut row = IntervalAllocator::new(9);
        let a = row.allocate(3).unwrap();
        let b = row.allocate(3).unwrap();
        let c = row.allocate(3).unwrap();
        assert_eq!(row.largest_free(), 0);
        row.free(a, 3);
        row.free(c, 3);
        assert_eq!(row.largest_free(), 3);
        row.free(b, 3);
        assert_eq!(row.largest_free(), 9);
        assert_eq!(row.allocate(9), Some(0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not fully allocated")]
    fn double_free_is_caught() {
        let mut row = IntervalAllocator::new(8);
        let a = row.allocate(4).unwrap();
        row.free(a, 4);
        row.free(a, 2);
    }
}
