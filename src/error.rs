// src/error.rs

//! The error taxonomy of the crate: two kinds cross the channel API boundary
//! ([`ClosedError`], [`CanceledError`]) plus the synchronous construction
//! failure of pre-loaded channels ([`CapacityError`]).

use core::fmt;

/// Error returned by `recv`, `send` and select commit callbacks when the
/// operation ran against a closed channel, or was still pending when the
/// channel closed.
///
/// This is always an expected, documented outcome of channel use, not a bug:
/// closing a channel broadcasts end-of-stream to every current and future
/// operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ClosedError;

impl std::error::Error for ClosedError {}
impl fmt::Display for ClosedError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "channel closed")
  }
}

/// Signal that a registered-but-unchosen operation was withdrawn.
///
/// A channel that dequeues a canceled operation discards it and keeps
/// scanning, so this error never reaches a well-behaved caller. It is
/// observable only by code that settles an operation it has itself already
/// canceled (the select engine, or a dropped future's leftover registration).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CanceledError;

impl std::error::Error for CanceledError {}
impl fmt::Display for CanceledError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "operation canceled")
  }
}

/// Error returned when constructing a pre-loaded channel whose explicit
/// capacity is smaller than the number of seed elements.
///
/// Construction failures are synchronous; they are never deferred into a
/// future.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CapacityError {
  /// The capacity that was requested.
  pub capacity: usize,
  /// The number of seed elements that had to fit.
  pub required: usize,
}

impl std::error::Error for CapacityError {}
impl fmt::Display for CapacityError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "capacity {} is smaller than the {} seed elements",
      self.capacity, self.required
    )
  }
}
