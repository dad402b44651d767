// src/channel.rs

//! The capability surface shared by both channel flavors.
//!
//! [`BoundedChannel`](crate::BoundedChannel) and
//! [`UnboundedChannel`](crate::UnboundedChannel) differ in storage strategy
//! and send-blocking policy but expose one trait. There is deliberately no
//! shared base type underneath: each flavor owns its own state and the trait
//! is the only common surface.

use crate::error::ClosedError;
use crate::op::{OpCell, TransitionHook};

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::fmt;
use std::rc::Rc;

use futures_core::stream::{FusedStream, Stream};

/// Outcome of a non-parking send attempt.
pub(crate) enum SendAttempt<T> {
  /// The value was buffered or handed to a waiting receiver.
  Done,
  /// The channel is closed; the value was dropped.
  Closed,
  /// No room and no waiting receiver; the value is handed back so the caller
  /// can park it.
  WouldBlock(T),
}

/// A FIFO message-passing channel for single-threaded cooperative programs.
///
/// A value handed to [`send`](Channel::send) becomes visible to exactly one
/// [`recv`](Channel::recv). Operations that cannot complete synchronously
/// suspend (on first poll) and resume in strict per-direction FIFO order when
/// a counterpart arrives. [`close`](Channel::close) broadcasts end-of-stream:
/// every pending and future operation fails with [`ClosedError`].
///
/// Handles are cheaply cloneable references to one shared channel.
pub trait Channel<T> {
  /// Future returned by [`recv`](Channel::recv).
  type Recv: Future<Output = Result<T, ClosedError>>;
  /// Future returned by [`send`](Channel::send).
  type Send: Future<Output = Result<(), ClosedError>>;

  /// Removes and returns the first available element.
  ///
  /// Suspends until an element (or a parked sender) is available. Fails with
  /// [`ClosedError`] if the channel is, or becomes, closed.
  fn recv(&self) -> Self::Recv;

  /// Adds an element to the end of the buffer.
  ///
  /// Suspends while the buffer is full and no receiver is waiting. Fails
  /// with [`ClosedError`] if the channel is, or becomes, closed; the value is
  /// dropped in that case.
  fn send(&self, value: T) -> Self::Send;

  /// Closes the channel: every pending operation is rejected with
  /// [`ClosedError`], the buffer is cleared, and all future operations fail
  /// immediately without queuing. Idempotent.
  fn close(&self);

  /// Buffer capacity; `None` for an unbounded channel.
  fn capacity(&self) -> Option<usize>;

  /// Buffered elements plus live parked senders minus live parked receivers.
  ///
  /// Negative while receivers hang on an empty channel, and above capacity
  /// while senders hang on a full one.
  fn len(&self) -> isize;

  /// Whether [`close`](Channel::close) has been called.
  fn is_closed(&self) -> bool;

  /// A lazy, non-restartable stream of received elements that ends cleanly
  /// when the channel closes.
  fn stream(&self) -> RecvStream<T, Self>
  where
    Self: Clone + Sized,
  {
    RecvStream {
      chan: self.clone(),
      in_flight: None,
      terminated: false,
    }
  }

  // ---- select plumbing (not public API) ----
  //
  // Readiness is derived purely from the observable `len`/`capacity`, never
  // from queue inspection. "Ready implies executable without suspension"
  // holds only under run-to-completion single-threaded scheduling, which is
  // the scheduling model of this crate.

  #[doc(hidden)]
  fn recv_ready(&self) -> bool {
    self.len() > 0
  }

  #[doc(hidden)]
  fn send_ready(&self) -> bool {
    match self.capacity() {
      None => true,
      Some(capacity) => self.len() < capacity as isize,
    }
  }

  #[doc(hidden)]
  fn commit_recv(&self) -> Result<T, ClosedError>;

  #[doc(hidden)]
  fn commit_send(&self, value: T) -> Result<(), ClosedError>;

  #[doc(hidden)]
  fn register_recv(&self, hook: Option<TransitionHook>) -> Rc<OpCell<T>>;

  #[doc(hidden)]
  fn register_send(&self, value: T, hook: Option<TransitionHook>) -> Rc<OpCell<()>>;
}

/// Stream adapter over repeated [`Channel::recv`] calls.
///
/// Yields every received element and terminates with `None` once the channel
/// reports [`ClosedError`]. Obtained from [`Channel::stream`].
#[must_use = "streams do nothing unless polled"]
pub struct RecvStream<T, C: Channel<T>> {
  chan: C,
  in_flight: Option<C::Recv>,
  terminated: bool,
}

impl<T, C: Channel<T>> fmt::Debug for RecvStream<T, C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecvStream")
      .field("in_flight", &self.in_flight.is_some())
      .field("terminated", &self.terminated)
      .finish_non_exhaustive()
  }
}

impl<T, C> Stream for RecvStream<T, C>
where
  C: Channel<T> + Unpin,
  C::Recv: Unpin,
{
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
    let this = self.get_mut();
    if this.terminated {
      return Poll::Ready(None);
    }

    if this.in_flight.is_none() {
      this.in_flight = Some(this.chan.recv());
    }
    let fut = this.in_flight.as_mut().expect("receive in flight");

    match Pin::new(fut).poll(cx) {
      Poll::Pending => Poll::Pending,
      Poll::Ready(outcome) => {
        this.in_flight = None;
        match outcome {
          Ok(value) => Poll::Ready(Some(value)),
          Err(ClosedError) => {
            this.terminated = true;
            Poll::Ready(None)
          }
        }
      }
    }
  }
}

impl<T, C> FusedStream for RecvStream<T, C>
where
  C: Channel<T> + Unpin,
  C::Recv: Unpin,
{
  fn is_terminated(&self) -> bool {
    self.terminated
  }
}
