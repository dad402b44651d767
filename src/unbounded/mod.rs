// src/unbounded/mod.rs

//! A channel with no capacity limit.
//!
//! `send` never parks: the value either goes straight to the earliest waiting
//! receiver or into the growable backing store. Only receivers ever queue.
//!
//! # Examples
//!
//! ```
//! use strand::{Channel, UnboundedChannel};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap()
//! #   .block_on(tokio::task::LocalSet::new().run_until(async {
//! let chan = UnboundedChannel::new();
//! for i in 0..100 {
//!   chan.send(i).await.unwrap(); // completes immediately, every time
//! }
//! assert_eq!(chan.len(), 100);
//! assert_eq!(chan.capacity(), None);
//! # }));
//! ```

use crate::channel::{Channel, SendAttempt};
use crate::error::ClosedError;
use crate::op::{OpCell, TransitionHook};
use crate::telemetry;

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;

const LOC_UNBOUNDED: &str = "UnboundedChannel";

const EVT_RECV_PARK: &str = "RecvPark";
const EVT_CLOSE: &str = "Close";

struct UnboundedCore<T> {
  buffer: VecDeque<T>,
  receivers: VecDeque<Rc<OpCell<T>>>,
  closed: bool,
}

/// A channel with an unlimited buffer. Cloning yields another handle to the
/// same channel.
pub struct UnboundedChannel<T> {
  core: Rc<RefCell<UnboundedCore<T>>>,
}

impl<T> Clone for UnboundedChannel<T> {
  fn clone(&self) -> Self {
    UnboundedChannel {
      core: Rc::clone(&self.core),
    }
  }
}

impl<T> fmt::Debug for UnboundedChannel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let core = self.core.borrow();
    f.debug_struct("UnboundedChannel")
      .field("buffered", &core.buffer.len())
      .field("parked_receivers", &core.receivers.len())
      .field("closed", &core.closed)
      .finish_non_exhaustive()
  }
}

impl<T> Default for UnboundedChannel<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> UnboundedChannel<T> {
  /// Creates an empty unbounded channel.
  pub fn new() -> Self {
    UnboundedChannel {
      core: Rc::new(RefCell::new(UnboundedCore {
        buffer: VecDeque::new(),
        receivers: VecDeque::new(),
        closed: false,
      })),
    }
  }

  fn try_recv_now(&self) -> Option<Result<T, ClosedError>> {
    let mut core = self.core.borrow_mut();
    if core.closed {
      return Some(Err(ClosedError));
    }
    core.buffer.pop_front().map(Ok)
  }

  fn try_send_now(&self, value: T) -> SendAttempt<T> {
    let mut core = self.core.borrow_mut();
    if core.closed {
      return SendAttempt::Closed;
    }

    while let Some(op) = core.receivers.pop_front() {
      if op.is_canceled() {
        // Leftover of an abandoned select or a dropped future.
        continue;
      }
      drop(core);
      op.fulfill(value).expect("dequeued receiver still pending");
      return SendAttempt::Done;
    }

    core.buffer.push_back(value);
    SendAttempt::Done
  }
}

impl<T> Channel<T> for UnboundedChannel<T> {
  type Recv = RecvFuture<T>;
  type Send = SendFuture<T>;

  fn recv(&self) -> RecvFuture<T> {
    RecvFuture {
      chan: self.clone(),
      parked: None,
    }
  }

  fn send(&self, value: T) -> SendFuture<T> {
    SendFuture {
      chan: self.clone(),
      value: Some(value),
    }
  }

  fn close(&self) {
    let receivers = {
      let mut core = self.core.borrow_mut();
      if core.closed {
        return;
      }
      core.closed = true;
      core.buffer.clear();
      mem::take(&mut core.receivers)
    };

    telemetry::log_event(
      LOC_UNBOUNDED,
      EVT_CLOSE,
      Some(format!("receivers:{}", receivers.len())),
    );

    for op in receivers {
      let _ = op.reject(ClosedError);
    }
  }

  fn capacity(&self) -> Option<usize> {
    None
  }

  fn len(&self) -> isize {
    let mut core = self.core.borrow_mut();
    core.receivers.retain(|op| !op.is_canceled());
    core.buffer.len() as isize - core.receivers.len() as isize
  }

  fn is_closed(&self) -> bool {
    self.core.borrow().closed
  }

  fn commit_recv(&self) -> Result<T, ClosedError> {
    match self.try_recv_now() {
      Some(outcome) => outcome,
      None => panic!("recv reported ready but would have parked"),
    }
  }

  fn commit_send(&self, value: T) -> Result<(), ClosedError> {
    match self.try_send_now(value) {
      SendAttempt::Done => Ok(()),
      SendAttempt::Closed => Err(ClosedError),
      SendAttempt::WouldBlock(_) => unreachable!("unbounded send cannot park"),
    }
  }

  fn register_recv(&self, hook: Option<TransitionHook>) -> Rc<OpCell<T>> {
    let op = OpCell::new(hook);
    let closed = {
      let mut core = self.core.borrow_mut();
      if core.closed {
        true
      } else {
        core.receivers.push_back(op.clone());
        false
      }
    };
    if closed {
      op.reject(ClosedError).expect("freshly created operation");
    } else {
      telemetry::log_event(LOC_UNBOUNDED, EVT_RECV_PARK, None);
    }
    op
  }

  fn register_send(&self, value: T, hook: Option<TransitionHook>) -> Rc<OpCell<()>> {
    // Sends never park here, so a registration settles on the spot.
    let op = OpCell::new(hook);
    match self.try_send_now(value) {
      SendAttempt::Done => op.fulfill(()).expect("freshly created operation"),
      SendAttempt::Closed => op.reject(ClosedError).expect("freshly created operation"),
      SendAttempt::WouldBlock(_) => unreachable!("unbounded send cannot park"),
    }
    op
  }
}

impl<T> FromIterator<T> for UnboundedChannel<T> {
  /// Builds a channel whose buffer starts out holding the sequence, in order.
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    UnboundedChannel {
      core: Rc::new(RefCell::new(UnboundedCore {
        buffer: iter.into_iter().collect(),
        receivers: VecDeque::new(),
        closed: false,
      })),
    }
  }
}

/// Future returned by [`UnboundedChannel::recv`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvFuture<T> {
  chan: UnboundedChannel<T>,
  parked: Option<Rc<OpCell<T>>>,
}

impl<T> fmt::Debug for RecvFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecvFuture")
      .field("parked", &self.parked.is_some())
      .finish_non_exhaustive()
  }
}

impl<T> Future for RecvFuture<T> {
  type Output = Result<T, ClosedError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();

    if let Some(op) = &this.parked {
      let outcome = std::task::ready!(op.poll_take(cx));
      this.parked = None;
      return Poll::Ready(outcome);
    }

    match this.chan.try_recv_now() {
      Some(outcome) => Poll::Ready(outcome),
      None => {
        let op = this.chan.register_recv(None);
        let first = op.poll_take(cx);
        debug_assert!(first.is_pending(), "a freshly parked recv is pending");
        this.parked = Some(op);
        Poll::Pending
      }
    }
  }
}

impl<T> Drop for RecvFuture<T> {
  fn drop(&mut self) {
    if let Some(op) = self.parked.take() {
      op.cancel();
    }
  }
}

/// Future returned by [`UnboundedChannel::send`]. Completes on first poll.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct SendFuture<T> {
  chan: UnboundedChannel<T>,
  value: Option<T>,
}

impl<T> Unpin for SendFuture<T> {}

impl<T> fmt::Debug for SendFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SendFuture").finish_non_exhaustive()
  }
}

impl<T> Future for SendFuture<T> {
  type Output = Result<(), ClosedError>;

  fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    let value = this.value.take().expect("send future polled after completion");
    match this.chan.try_send_now(value) {
      SendAttempt::Done => Poll::Ready(Ok(())),
      SendAttempt::Closed => Poll::Ready(Err(ClosedError)),
      SendAttempt::WouldBlock(_) => unreachable!("unbounded send cannot park"),
    }
  }
}
