// src/bounded/mod.rs

//! A fixed-capacity buffered channel.
//!
//! `BoundedChannel<T>` composes a pre-sized ring buffer with two FIFO queues
//! of parked operations, one per direction. Capacity 0 makes it a rendezvous
//! channel: every transfer pairs one sender with one receiver directly.
//!
//! # Examples
//!
//! ```
//! use strand::{BoundedChannel, Channel};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap()
//! #   .block_on(tokio::task::LocalSet::new().run_until(async {
//! let chan = BoundedChannel::new(2);
//!
//! chan.send(42).await.unwrap();
//! chan.send(36).await.unwrap();
//! assert_eq!(chan.len(), 2);
//!
//! assert_eq!(chan.recv().await, Ok(42));
//! assert_eq!(chan.recv().await, Ok(36));
//! # }));
//! ```

mod core;

use self::core::{BlockedSend, BoundedCore, RecvStep, SendStep};
use crate::channel::{Channel, SendAttempt};
use crate::error::{CapacityError, ClosedError};
use crate::op::{OpCell, TransitionHook};
use crate::telemetry;

use ::core::future::Future;
use ::core::pin::Pin;
use ::core::task::{Context, Poll};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

const LOC_BOUNDED: &str = "BoundedChannel";

const EVT_RECV_PARK: &str = "RecvPark";
const EVT_SEND_PARK: &str = "SendPark";
const EVT_CLOSE: &str = "Close";

const CTR_DIRECT_DELIVERIES: &str = "DirectDeliveries";

/// A fixed-capacity buffered channel. Cloning yields another handle to the
/// same channel.
pub struct BoundedChannel<T> {
  core: Rc<RefCell<BoundedCore<T>>>,
}

impl<T> Clone for BoundedChannel<T> {
  fn clone(&self) -> Self {
    BoundedChannel {
      core: Rc::clone(&self.core),
    }
  }
}

impl<T> fmt::Debug for BoundedChannel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let core = self.core.borrow();
    f.debug_struct("BoundedChannel")
      .field("capacity", &core.buffer.capacity())
      .field("buffered", &core.buffer.len())
      .field("parked_receivers", &core.receivers.len())
      .field("parked_senders", &core.senders.len())
      .field("closed", &core.closed)
      .finish_non_exhaustive()
  }
}

impl<T> BoundedChannel<T> {
  /// Creates an empty channel holding at most `capacity` elements.
  ///
  /// Capacity 0 is a rendezvous channel: `send` completes only when a
  /// receiver takes the value.
  pub fn new(capacity: usize) -> Self {
    BoundedChannel {
      core: Rc::new(RefCell::new(BoundedCore::new(capacity))),
    }
  }

  /// Creates a channel pre-loaded with `items`, with an explicit capacity.
  ///
  /// Fails with [`CapacityError`] when `capacity` is smaller than the number
  /// of items. With the default capacity (the number of items) use the
  /// [`FromIterator`] impl instead.
  pub fn preloaded<I>(items: I, capacity: usize) -> Result<Self, CapacityError>
  where
    I: IntoIterator<Item = T>,
  {
    let core = BoundedCore::preloaded(items.into_iter().collect(), Some(capacity))?;
    Ok(BoundedChannel {
      core: Rc::new(RefCell::new(core)),
    })
  }

  fn try_recv_now(&self) -> Option<Result<T, ClosedError>> {
    let step = self.core.borrow_mut().recv_step();
    match step {
      RecvStep::Closed => Some(Err(ClosedError)),
      RecvStep::Value { value, unblock } => {
        if let Some(op) = unblock {
          // Settled outside the borrow; the observer may touch the channel.
          op.fulfill(()).expect("dequeued sender still pending");
        }
        Some(Ok(value))
      }
      RecvStep::MustPark => None,
    }
  }

  fn try_send_now(&self, value: T) -> SendAttempt<T> {
    let step = self.core.borrow_mut().send_step(value);
    match step {
      SendStep::Closed => SendAttempt::Closed,
      SendStep::Done => SendAttempt::Done,
      SendStep::Deliver { receiver, value } => {
        telemetry::increment_counter(LOC_BOUNDED, CTR_DIRECT_DELIVERIES);
        receiver.fulfill(value).expect("dequeued receiver still pending");
        SendAttempt::Done
      }
      SendStep::MustPark(value) => SendAttempt::WouldBlock(value),
    }
  }
}

impl<T> Channel<T> for BoundedChannel<T> {
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
      parked: None,
    }
  }

  fn close(&self) {
    let (receivers, senders) = {
      let mut core = self.core.borrow_mut();
      if core.closed {
        return;
      }
      core.closed = true;
      core.buffer.clear();
      (mem::take(&mut core.receivers), mem::take(&mut core.senders))
    };

    telemetry::log_event(
      LOC_BOUNDED,
      EVT_CLOSE,
      Some(format!("receivers:{} senders:{}", receivers.len(), senders.len())),
    );

    // Entries canceled while this loop runs (a rejection observer may cancel
    // its siblings) report CanceledError and are skipped.
    for op in receivers {
      let _ = op.reject(ClosedError);
    }
    for blocked in senders {
      let _ = blocked.op.reject(ClosedError);
    }
  }

  fn capacity(&self) -> Option<usize> {
    Some(self.core.borrow().buffer.capacity())
  }

  fn len(&self) -> isize {
    self.core.borrow_mut().live_len()
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
      SendAttempt::WouldBlock(_) => panic!("send reported ready but would have parked"),
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
      // Never enqueued: the operation settles on the spot.
      op.reject(ClosedError).expect("freshly created operation");
    } else {
      telemetry::log_event(LOC_BOUNDED, EVT_RECV_PARK, None);
    }
    op
  }

  fn register_send(&self, value: T, hook: Option<TransitionHook>) -> Rc<OpCell<()>> {
    let op = OpCell::new(hook);
    let closed = {
      let mut core = self.core.borrow_mut();
      if core.closed {
        true
      } else {
        core.senders.push_back(BlockedSend {
          value,
          op: op.clone(),
        });
        false
      }
    };
    if closed {
      op.reject(ClosedError).expect("freshly created operation");
    } else {
      telemetry::log_event(LOC_BOUNDED, EVT_SEND_PARK, None);
    }
    op
  }
}

impl<T> FromIterator<T> for BoundedChannel<T> {
  /// Builds a channel pre-loaded with the sequence, its capacity equal to the
  /// sequence length.
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    let core = BoundedCore::preloaded(iter.into_iter().collect(), None)
      .expect("capacity defaults to the sequence length");
    BoundedChannel {
      core: Rc::new(RefCell::new(core)),
    }
  }
}

/// Future returned by [`BoundedChannel::recv`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvFuture<T> {
  chan: BoundedChannel<T>,
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
    // Withdraw a still-parked registration so the channel never delivers
    // into an operation nobody is awaiting.
    if let Some(op) = self.parked.take() {
      op.cancel();
    }
  }
}

/// Future returned by [`BoundedChannel::send`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct SendFuture<T> {
  chan: BoundedChannel<T>,
  value: Option<T>,
  parked: Option<Rc<OpCell<()>>>,
}

// No field is structurally pinned; the pending value moves freely.
impl<T> Unpin for SendFuture<T> {}

impl<T> fmt::Debug for SendFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SendFuture")
      .field("parked", &self.parked.is_some())
      .finish_non_exhaustive()
  }
}

impl<T> Future for SendFuture<T> {
  type Output = Result<(), ClosedError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();

    if let Some(op) = &this.parked {
      let outcome = std::task::ready!(op.poll_take(cx));
      this.parked = None;
      return Poll::Ready(outcome);
    }

    let value = this.value.take().expect("send future polled after completion");
    match this.chan.try_send_now(value) {
      SendAttempt::Done => Poll::Ready(Ok(())),
      SendAttempt::Closed => Poll::Ready(Err(ClosedError)),
      SendAttempt::WouldBlock(value) => {
        let op = this.chan.register_send(value, None);
        let first = op.poll_take(cx);
        debug_assert!(first.is_pending(), "a freshly parked send is pending");
        this.parked = Some(op);
        Poll::Pending
      }
    }
  }
}

impl<T> Drop for SendFuture<T> {
  fn drop(&mut self) {
    // The queued entry (and the value it carries) is discarded by the channel
    // the next time it scans past the canceled cell.
    if let Some(op) = self.parked.take() {
      op.cancel();
    }
  }
}
