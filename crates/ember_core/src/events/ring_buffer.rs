//! # Ring Buffer
//!
//! Growable FIFO queue over one contiguous allocation.
//!
//! ```text
//! capacity = 8, head = 5, len = 5
//!
//! slot:  0   1   2   3   4   5   6   7
//!      [ d | e | . | . | . | a | b | c ]
//!                            ^ head
//! logical order: a b c d e
//! ```
//!
//! When full, the buffer doubles and repacks the live elements at slot 0.

// SAFETY: This module tracks slot initialization by hand over MaybeUninit.
// Slot `(head + i) % capacity` is initialized exactly when `i < len`.
#![allow(unsafe_code)]

use std::fmt;
use std::iter::Chain;
use std::mem::{self, MaybeUninit};
use std::ops::{Index, IndexMut};
use std::slice;

/// Smallest non-zero capacity.
const MIN_CAPACITY: usize = 4;

/// Iterator over a [`RingBuffer`], head to tail.
pub type Iter<'a, T> = Chain<slice::Iter<'a, T>, slice::Iter<'a, T>>;

/// Mutable iterator over a [`RingBuffer`], head to tail.
pub type IterMut<'a, T> = Chain<slice::IterMut<'a, T>, slice::IterMut<'a, T>>;

/// Growable circular FIFO queue.
///
/// # Example
///
/// ```rust
/// use ember_core::RingBuffer;
///
/// let mut ring = RingBuffer::new();
/// ring.push(1);
/// ring.push(2);
/// *ring.emplace(3) += 10;
/// assert_eq!(ring.pop(), Some(1));
/// assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 13]);
/// ```
pub struct RingBuffer<T> {
    buf: Box<[MaybeUninit<T>]>,
    head: usize,
    len: usize,
}

fn uninit_slots<T>(capacity: usize) -> Box<[MaybeUninit<T>]> {
    (0..capacity).map(|_| MaybeUninit::uninit()).collect()
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer without allocating.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty buffer with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: uninit_slots(capacity),
            head: 0,
            len: 0,
        }
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if the buffer holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements the buffer can hold before growing.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Physical slot of logical position `i`. Requires `i < capacity`.
    #[inline]
    fn slot(&self, i: usize) -> usize {
        let idx = self.head + i;
        if idx >= self.buf.len() {
            idx - self.buf.len()
        } else {
            idx
        }
    }

    /// Grows the capacity to at least `capacity`. No-op if it already is.
    ///
    /// Grows to at least double the current capacity and repacks the live
    /// elements starting at slot 0. Never shrinks.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.capacity() {
            return;
        }

        let new_cap = capacity.max(self.capacity() * 2).max(MIN_CAPACITY);
        let mut new_buf = uninit_slots(new_cap);
        for (i, dst) in new_buf.iter_mut().take(self.len).enumerate() {
            let src = self.slot(i);
            *dst = mem::replace(&mut self.buf[src], MaybeUninit::uninit());
        }
        self.buf = new_buf;
        self.head = 0;
    }

    /// Appends `value` at the tail and returns a reference to it.
    pub fn emplace(&mut self, value: T) -> &mut T {
        let needed = self.len.checked_add(1).expect("ring buffer capacity overflow");
        self.reserve(needed);
        let idx = self.slot(self.len);
        self.len += 1;
        self.buf[idx].write(value)
    }

    /// Appends `value` at the tail.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.emplace(value);
    }

    /// Removes and returns the head element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        // SAFETY: len > 0, so the head slot is initialized; advancing head
        // marks it uninitialized.
        let value = unsafe { self.buf[self.head].assume_init_read() };
        self.head = self.slot(1);
        self.len -= 1;
        Some(value)
    }

    /// Borrows the head element.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.get(0)
    }

    /// Mutably borrows the head element.
    #[inline]
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.get_mut(0)
    }

    /// Borrows the element at logical position `i` (0 is the head).
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.len {
            return None;
        }
        // SAFETY: i < len.
        Some(unsafe { self.buf[self.slot(i)].assume_init_ref() })
    }

    /// Mutably borrows the element at logical position `i`.
    #[inline]
    pub fn get_mut(&mut self, i: usize) -> Option<&mut T> {
        if i >= self.len {
            return None;
        }
        let idx = self.slot(i);
        // SAFETY: i < len.
        Some(unsafe { self.buf[idx].assume_init_mut() })
    }

    /// The live elements as two slices, head part first.
    #[must_use]
    pub fn as_slices(&self) -> (&[T], &[T]) {
        let first = self.len.min(self.capacity() - self.head);
        let front = &self.buf[self.head..self.head + first];
        let back = &self.buf[..self.len - first];
        // SAFETY: both ranges cover exactly the initialized slots, and
        // MaybeUninit<T> has the layout of T.
        unsafe { (assume_init_slice(front), assume_init_slice(back)) }
    }

    /// The live elements as two mutable slices, head part first.
    pub fn as_mut_slices(&mut self) -> (&mut [T], &mut [T]) {
        let first = self.len.min(self.capacity() - self.head);
        let wrapped = self.len - first;
        let (left, right) = self.buf.split_at_mut(self.head);
        // SAFETY: as in `as_slices`; `wrapped <= head` so the ranges are
        // disjoint halves of the split.
        unsafe {
            (
                assume_init_slice_mut(&mut right[..first]),
                assume_init_slice_mut(&mut left[..wrapped]),
            )
        }
    }

    /// Iterates head to tail.
    pub fn iter(&self) -> Iter<'_, T> {
        let (front, back) = self.as_slices();
        front.iter().chain(back)
    }

    /// Mutably iterates head to tail.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        let (front, back) = self.as_mut_slices();
        front.iter_mut().chain(back)
    }

    /// Drops the first `n` elements (or all, if fewer remain).
    pub fn drop_front(&mut self, n: usize) {
        for _ in 0..n.min(self.len) {
            // SAFETY: len > 0 inside the loop, so head is initialized.
            unsafe { self.buf[self.head].assume_init_drop() };
            self.head = self.slot(1);
            self.len -= 1;
        }
        if self.len == 0 {
            self.head = 0;
        }
    }

    /// Drops every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.drop_front(self.len);
    }
}

/// # Safety
///
/// Every element of `slots` must be initialized.
unsafe fn assume_init_slice<T>(slots: &[MaybeUninit<T>]) -> &[T] {
    // SAFETY: forwarded from the caller.
    unsafe { &*(slots as *const [MaybeUninit<T>] as *const [T]) }
}

/// # Safety
///
/// Every element of `slots` must be initialized.
unsafe fn assume_init_slice_mut<T>(slots: &mut [MaybeUninit<T>]) -> &mut [T] {
    // SAFETY: forwarded from the caller.
    unsafe { &mut *(slots as *mut [MaybeUninit<T>] as *mut [T]) }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        let mut out = Self::with_capacity(self.capacity());
        out.extend(self.iter().cloned());
        out
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        let len = self.len;
        self.get(i)
            .unwrap_or_else(|| panic!("index {i} out of range for ring buffer of length {len}"))
    }
}

impl<T> IndexMut<usize> for RingBuffer<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        let len = self.len;
        self.get_mut(i)
            .unwrap_or_else(|| panic!("index {i} out of range for ring buffer of length {len}"))
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(self.len.saturating_add(iter.size_hint().0));
        for value in iter {
            self.push(value);
        }
    }
}

impl<T> FromIterator<T> for RingBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ring = Self::new();
        ring.extend(iter);
        ring
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut RingBuffer<T> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
