// src/internal/ring_buffer.rs

//! Fixed-capacity FIFO ring used as the backing store of bounded channels.
//!
//! Storage is allocated once at construction and never grows; `push` and
//! `shift` are O(1) via a wrapping head index. The owning channel is the only
//! mutator, so overflow and underflow here indicate a broken capacity
//! invariant upstream, not a user error.

use crate::error::CapacityError;

use core::fmt;

/// Error returned by [`RingBuffer::push`] when the buffer is at capacity.
/// The rejected value is handed back to the caller.
pub(crate) struct Full<T>(pub(crate) T);

impl<T> fmt::Debug for Full<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Full(..)")
  }
}

pub(crate) struct RingBuffer<T> {
  buf: Box<[Option<T>]>,
  head: usize,
  len: usize,
}

impl<T> fmt::Debug for RingBuffer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
      .field("capacity", &self.capacity())
      .field("len", &self.len)
      .field("head", &self.head)
      .finish_non_exhaustive()
  }
}

impl<T> RingBuffer<T> {
  pub(crate) fn new(capacity: usize) -> Self {
    RingBuffer {
      buf: std::iter::repeat_with(|| None).take(capacity).collect(),
      head: 0,
      len: 0,
    }
  }

  /// Builds a ring already holding `items`, in order.
  ///
  /// The capacity defaults to the number of items; an explicit capacity must
  /// be at least that number or construction fails with a [`CapacityError`].
  pub(crate) fn preloaded(items: Vec<T>, capacity: Option<usize>) -> Result<Self, CapacityError> {
    let required = items.len();
    let capacity = capacity.unwrap_or(required);
    if capacity < required {
      return Err(CapacityError { capacity, required });
    }

    let mut buf: Vec<Option<T>> = items.into_iter().map(Some).collect();
    buf.resize_with(capacity, || None);

    Ok(RingBuffer {
      buf: buf.into_boxed_slice(),
      head: 0,
      len: required,
    })
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.buf.len()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline]
  pub(crate) fn is_full(&self) -> bool {
    self.len == self.buf.len()
  }

  /// Appends at the logical tail.
  pub(crate) fn push(&mut self, value: T) -> Result<(), Full<T>> {
    if self.is_full() {
      return Err(Full(value));
    }

    let index = (self.head + self.len) % self.buf.len();
    self.buf[index] = Some(value);
    self.len += 1;
    Ok(())
  }

  /// Removes and returns the logical head, or `None` when empty.
  pub(crate) fn shift(&mut self) -> Option<T> {
    if self.len == 0 {
      return None;
    }

    let value = self.buf[self.head].take();
    debug_assert!(value.is_some(), "occupied slot at the ring head");
    self.head = (self.head + 1) % self.buf.len();
    self.len -= 1;
    value
  }

  /// Drops every buffered element.
  pub(crate) fn clear(&mut self) {
    for slot in self.buf.iter_mut() {
      slot.take();
    }
    self.head = 0;
    self.len = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn push_and_shift_wrap_around() {
    let mut ring = RingBuffer::new(2);

    ring.push(42).unwrap();
    assert_eq!(ring.shift(), Some(42));
    assert_eq!(ring.len(), 0);

    ring.push(36).unwrap();
    assert_eq!(ring.shift(), Some(36));

    // Head has wrapped; a third cycle still works.
    ring.push(7).unwrap();
    assert_eq!(ring.shift(), Some(7));
    assert_eq!(ring.len(), 0);
  }

  #[test]
  fn fill_from_the_middle() {
    let mut ring = RingBuffer::new(2);

    ring.push(1).unwrap();
    assert_eq!(ring.shift(), Some(1));

    ring.push(42).unwrap();
    ring.push(36).unwrap();
    assert_eq!(ring.len(), 2);
    assert!(ring.is_full());

    assert_eq!(ring.shift(), Some(42));
    assert_eq!(ring.shift(), Some(36));
  }

  #[test]
  fn push_full_returns_the_value() {
    let mut ring = RingBuffer::new(2);
    assert_eq!(ring.capacity(), 2);

    ring.push(42).unwrap();
    ring.push(36).unwrap();

    let err = ring.push(7).unwrap_err();
    assert_eq!(err.0, 7);
    assert_eq!(ring.len(), 2);
  }

  #[test]
  fn shift_empty_is_none() {
    let mut ring = RingBuffer::<i32>::new(2);
    assert_eq!(ring.shift(), None);
    assert_eq!(ring.len(), 0);
  }

  #[test]
  fn zero_capacity_rejects_everything() {
    let mut ring = RingBuffer::new(0);
    assert!(ring.is_full());
    assert!(ring.push(1).is_err());
    assert_eq!(ring.shift(), None);
  }

  #[test]
  fn preloaded_defaults_capacity_to_len() {
    let mut ring = RingBuffer::preloaded(vec![42, 36, 7], None).unwrap();
    assert_eq!(ring.capacity(), 3);
    assert_eq!(ring.len(), 3);

    assert_eq!(ring.shift(), Some(42));
    assert_eq!(ring.shift(), Some(36));
    assert_eq!(ring.shift(), Some(7));
  }

  #[test]
  fn preloaded_with_explicit_capacity() {
    let mut ring = RingBuffer::preloaded(vec![42, 36], 5.into()).unwrap();
    assert_eq!(ring.capacity(), 5);
    assert_eq!(ring.len(), 2);

    ring.push(7).unwrap();
    assert_eq!(ring.shift(), Some(42));
    assert_eq!(ring.shift(), Some(36));
    assert_eq!(ring.shift(), Some(7));
  }

  #[test]
  fn preloaded_with_insufficient_capacity_fails() {
    let err = RingBuffer::preloaded(vec![1, 2, 3], Some(2)).unwrap_err();
    assert_eq!(
      err,
      CapacityError {
        capacity: 2,
        required: 3
      }
    );
  }

  #[test]
  fn clear_drops_everything() {
    let mut ring = RingBuffer::preloaded(vec![1, 2], Some(4)).unwrap();
    ring.clear();
    assert!(ring.is_empty());
    assert_eq!(ring.shift(), None);
    ring.push(9).unwrap();
    assert_eq!(ring.shift(), Some(9));
  }
}
