//! Stable-address arena
//!
//! Append-only storage for node and attribute records. Items live in
//! geometrically sized buckets (16, 32, 64, ... items); a bucket is allocated
//! once at its final capacity and never reallocated, so a reference or index
//! handed out stays valid for the arena's whole lifetime.
//!
//! ```text
//! bucket 0: [0 .. 16)     16 items
//! bucket 1: [16 .. 48)    32 items
//! bucket 2: [48 .. 112)   64 items
//! ...
//! ```
//!
//! Index `i` lives in bucket `floor(log2(i / 16 + 1))`, so random access needs
//! no per-item metadata.

use crate::error::{Result, XmlError};

/// Capacity of the first bucket
const FIRST_BUCKET: usize = 16;
const FIRST_BUCKET_SHIFT: u32 = FIRST_BUCKET.trailing_zeros();

/// Directory size. 28 buckets address 16 * (2^28 - 1) items, just under 2^32.
const BUCKET_COUNT: usize = 28;

/// Largest number of items an arena can hold
pub const MAX_ITEMS: usize = FIRST_BUCKET * ((1 << BUCKET_COUNT) - 1);

/// Append-only list whose items never move
#[derive(Debug)]
pub struct Arena<T> {
    /// Each bucket is created with its exact capacity and never grows past it
    buckets: Vec<Vec<T>>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an index to (bucket, offset within bucket)
#[inline]
fn locate(index: usize) -> (usize, usize) {
    let bucket = ((index >> FIRST_BUCKET_SHIFT) + 1).ilog2() as usize;
    let bucket_start = FIRST_BUCKET * ((1 << bucket) - 1);
    (bucket, index - bucket_start)
}

#[inline]
fn bucket_capacity(bucket: usize) -> usize {
    FIRST_BUCKET << bucket
}

impl<T> Arena<T> {
    /// Create an empty arena. No memory is allocated until the first append.
    pub fn new() -> Self {
        Arena {
            buckets: Vec::new(),
            len: 0,
        }
    }

    /// Append an item, returning its index
    pub fn append(&mut self, item: T) -> Result<usize> {
        let index = self.len;
        if index >= MAX_ITEMS {
            return Err(XmlError::CapacityExceeded { max: MAX_ITEMS });
        }
        let (bucket, _) = locate(index);
        if bucket == self.buckets.len() {
            // Only the directory entry is new; existing bucket memory stays put
            self.buckets.push(Vec::with_capacity(bucket_capacity(bucket)));
        }
        self.buckets[bucket].push(item);
        self.len += 1;
        Ok(index)
    }

    /// Get an item by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let (bucket, offset) = locate(index);
        self.buckets.get(bucket)?.get(offset)
    }

    /// Get a mutable item by index (used while the tree is being linked)
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let (bucket, offset) = locate(index);
        self.buckets.get_mut(bucket)?.get_mut(offset)
    }

    /// Number of items appended so far
    #[inline]
    pub fn count(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate `count` items starting at `start`, clamped to the arena length
    pub fn iterate(&self, start: usize, count: usize) -> ArenaIter<'_, T> {
        let end = start.saturating_add(count).min(self.len);
        ArenaIter {
            arena: self,
            next: start.min(end),
            end,
        }
    }

    /// Iterate every item in append order
    pub fn iter(&self) -> ArenaIter<'_, T> {
        self.iterate(0, self.len)
    }
}

impl<T> std::ops::Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!("arena index {index} out of bounds (len {})", self.len),
        }
    }
}

/// Iterator over a contiguous index range of an arena
pub struct ArenaIter<'a, T> {
    arena: &'a Arena<T>,
    next: usize,
    end: usize,
}

impl<'a, T> Iterator for ArenaIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let item = self.arena.get(self.next);
        self.next += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for ArenaIter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_bucket_boundaries() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(15), (0, 15));
        assert_eq!(locate(16), (1, 0));
        assert_eq!(locate(47), (1, 31));
        assert_eq!(locate(48), (2, 0));
        assert_eq!(locate(111), (2, 63));
        assert_eq!(locate(112), (3, 0));
    }

    #[test]
    fn test_locate_last_item() {
        let (bucket, offset) = locate(MAX_ITEMS - 1);
        assert_eq!(bucket, BUCKET_COUNT - 1);
        assert_eq!(offset, bucket_capacity(bucket) - 1);
    }

    #[test]
    fn test_append_and_get() {
        let mut arena = Arena::new();
        for i in 0..1000u32 {
            assert_eq!(arena.append(i).unwrap(), i as usize);
        }
        assert_eq!(arena.count(), 1000);
        assert_eq!(arena.get(0), Some(&0));
        assert_eq!(arena.get(500), Some(&500));
        assert_eq!(arena[999], 999);
        assert_eq!(arena.get(1000), None);
    }

    #[test]
    fn test_addresses_never_move() {
        let mut arena = Arena::new();
        arena.append(7u64).unwrap();
        let first = arena.get(0).unwrap() as *const u64;
        for i in 0..10_000u64 {
            arena.append(i).unwrap();
        }
        assert_eq!(arena.get(0).unwrap() as *const u64, first);
        assert_eq!(arena[0], 7);
    }

    #[test]
    fn test_iterate_range() {
        let mut arena = Arena::new();
        for i in 0..40 {
            arena.append(i).unwrap();
        }
        // Spans the first and second bucket
        let slice: Vec<_> = arena.iterate(10, 10).copied().collect();
        assert_eq!(slice, (10..20).collect::<Vec<_>>());
        assert_eq!(arena.iterate(35, 100).count(), 5);
        assert_eq!(arena.iterate(50, 3).count(), 0);
    }

    #[test]
    fn test_get_mut() {
        let mut arena = Arena::new();
        arena.append(String::from("a")).unwrap();
        arena.get_mut(0).unwrap().push('b');
        assert_eq!(arena[0], "ab");
        assert!(arena.get_mut(1).is_none());
    }
}
