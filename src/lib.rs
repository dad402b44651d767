// src/lib.rs

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! CSP-style message-passing channels with a multi-way select, for
//! single-threaded cooperative async Rust.
//!
//! Strand lets producers and consumers on one event loop coordinate without
//! shared-memory locks: a value handed to `send` becomes visible to exactly
//! one `recv`, operations suspend when no counterpart or buffer slot exists,
//! and closing a channel broadcasts end-of-stream to every current and future
//! waiter. Everything here is `!Send` by design — drive it with a
//! current-thread executor such as `tokio::task::LocalSet` or
//! `futures::executor::LocalPool`.
//!
//! Two channel flavors share the [`Channel`] capability:
//!
//! - [`BoundedChannel`]: a fixed-capacity ring buffer; senders park when it
//!   is full and no receiver waits. Capacity 0 is a rendezvous channel.
//! - [`UnboundedChannel`]: no capacity limit; `send` always completes
//!   immediately.
//!
//! The [`select`] module waits on several operations across any mix of
//! channels and commits exactly one.
//!
//! # Examples
//!
//! ```
//! use strand::{bounded, Channel};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap()
//! #   .block_on(tokio::task::LocalSet::new().run_until(async {
//! let chan = bounded::<&str>(0); // rendezvous
//! let tx = chan.clone();
//!
//! tokio::task::spawn_local(async move {
//!   tx.send("ping").await.unwrap();
//! });
//!
//! assert_eq!(chan.recv().await, Ok("ping"));
//! # }));
//! ```

pub mod error;

// Channel flavors and the select engine.
pub mod bounded;
pub mod select;
pub mod unbounded;

pub mod telemetry;

// Internal utilities - not part of the public API.
mod channel;
mod internal;
#[doc(hidden)]
pub mod op;

// Public re-exports for convenience.
pub use bounded::BoundedChannel;
pub use channel::{Channel, RecvStream};
pub use error::{CanceledError, CapacityError, ClosedError};
pub use unbounded::UnboundedChannel;

/// Creates a bounded channel holding at most `capacity` elements.
///
/// Shorthand for [`BoundedChannel::new`]. Capacity 0 yields a rendezvous
/// channel.
pub fn bounded<T>(capacity: usize) -> BoundedChannel<T> {
  BoundedChannel::new(capacity)
}

/// Creates a channel with no capacity limit; its `send` never suspends.
///
/// Shorthand for [`UnboundedChannel::new`].
pub fn unbounded<T>() -> UnboundedChannel<T> {
  UnboundedChannel::new()
}
