// src/bounded/core.rs

//! The shared state and fast-path logic of the bounded channel.
//!
//! All state lives in one `BoundedCore` behind the handle's `RefCell`. The
//! step methods mutate queues and buffer under that borrow and hand back any
//! dequeued cell for the caller to settle *after* the borrow is released, so
//! a transition observer (which may cancel registrations on this very
//! channel) never sees the state mid-mutation.

use crate::error::CapacityError;
use crate::internal::ring_buffer::RingBuffer;
use crate::op::OpCell;

use std::collections::VecDeque;
use std::rc::Rc;

/// A parked sender: the value it is waiting to deliver plus its cell.
pub(crate) struct BlockedSend<T> {
  pub(crate) value: T,
  pub(crate) op: Rc<OpCell<()>>,
}

/// What a receive attempt decided, before any settlement has happened.
pub(crate) enum RecvStep<T> {
  Closed,
  /// A value for the receiver; `unblock` is a dequeued sender whose cell must
  /// now be fulfilled.
  Value {
    value: T,
    unblock: Option<Rc<OpCell<()>>>,
  },
  MustPark,
}

/// What a send attempt decided.
pub(crate) enum SendStep<T> {
  Closed,
  /// The value was buffered.
  Done,
  /// The earliest parked receiver takes the value directly; its cell must now
  /// be fulfilled with `value`.
  Deliver { receiver: Rc<OpCell<T>>, value: T },
  MustPark(T),
}

pub(crate) struct BoundedCore<T> {
  pub(crate) buffer: RingBuffer<T>,
  pub(crate) receivers: VecDeque<Rc<OpCell<T>>>,
  pub(crate) senders: VecDeque<BlockedSend<T>>,
  pub(crate) closed: bool,
}

impl<T> BoundedCore<T> {
  pub(crate) fn new(capacity: usize) -> Self {
    BoundedCore {
      buffer: RingBuffer::new(capacity),
      receivers: VecDeque::new(),
      senders: VecDeque::new(),
      closed: false,
    }
  }

  pub(crate) fn preloaded(items: Vec<T>, capacity: Option<usize>) -> Result<Self, CapacityError> {
    Ok(BoundedCore {
      buffer: RingBuffer::preloaded(items, capacity)?,
      receivers: VecDeque::new(),
      senders: VecDeque::new(),
      closed: false,
    })
  }

  /// Receive fast path: earliest live parked sender first, then the buffer.
  ///
  /// Canceled entries found while dequeuing are leftovers of an abandoned
  /// select or a dropped future; they are discarded and the scan continues.
  pub(crate) fn recv_step(&mut self) -> RecvStep<T> {
    if self.closed {
      return RecvStep::Closed;
    }

    while let Some(blocked) = self.senders.pop_front() {
      if blocked.op.is_canceled() {
        continue;
      }
      let BlockedSend { value, op } = blocked;
      let value = match self.buffer.shift() {
        // Buffered head goes out; the sender's value takes the freed slot.
        Some(head) => {
          self.buffer.push(value).expect("slot freed by the shift");
          head
        }
        // Rendezvous: the sender's value is delivered directly.
        None => value,
      };
      return RecvStep::Value {
        value,
        unblock: Some(op),
      };
    }

    match self.buffer.shift() {
      Some(value) => RecvStep::Value {
        value,
        unblock: None,
      },
      None => RecvStep::MustPark,
    }
  }

  /// Send fast path: free buffer slot first, then the earliest live parked
  /// receiver. A sender only ever parks when the buffer is full *and* no
  /// receiver is waiting.
  pub(crate) fn send_step(&mut self, value: T) -> SendStep<T> {
    if self.closed {
      return SendStep::Closed;
    }

    if !self.buffer.is_full() {
      self.buffer.push(value).expect("buffer has a free slot");
      return SendStep::Done;
    }

    while let Some(op) = self.receivers.pop_front() {
      if op.is_canceled() {
        continue;
      }
      return SendStep::Deliver { receiver: op, value };
    }

    SendStep::MustPark(value)
  }

  /// Signed occupancy: buffered elements plus live parked senders minus live
  /// parked receivers. Canceled registrations are purged on the way.
  pub(crate) fn live_len(&mut self) -> isize {
    self.receivers.retain(|op| !op.is_canceled());
    self.senders.retain(|blocked| !blocked.op.is_canceled());

    self.buffer.len() as isize + self.senders.len() as isize - self.receivers.len() as isize
  }
}
