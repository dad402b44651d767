// src/op.rs

//! Single-settlement completion cells for parked `recv`/`send` operations.
//!
//! An [`OpCell`] is created when an operation cannot complete synchronously.
//! It is held jointly by the channel (queued FIFO until a counterpart
//! arrives) and by the awaiting future or select engine, which may cancel it.
//! The cell settles or cancels exactly once:
//!
//! ```text
//! Pending ──fulfill/reject──► Settled ──poll_take──► Taken
//!    └───────cancel─────────► Canceled
//! ```
//!
//! A transition observer, supplied at construction, runs synchronously and
//! exactly once as part of the first transition out of `Pending` — the state
//! tag flips first, then the observer fires, then any parked waker is woken.
//! The select engine relies on that ordering to cancel sibling registrations
//! before the winner's outcome becomes observable to its own task.
//!
//! Settling an already-canceled cell fails with [`CanceledError`] instead of
//! silently succeeding, which is what keeps a channel from delivering into an
//! operation an engine already abandoned; channels avoid even that by
//! discarding canceled entries while dequeuing. Settling twice is a
//! programmer error and panics.

use crate::error::{CanceledError, ClosedError};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Final result of a parked operation.
pub type Outcome<T> = Result<T, ClosedError>;

/// Observer invoked exactly once, at the first transition out of `Pending`.
pub type TransitionHook = Box<dyn FnOnce()>;

enum State<T> {
  Pending,
  Settled(Outcome<T>),
  Taken,
  Canceled,
}

/// A single blocked `recv` or `send`, reduced to its settlement.
///
/// `T` is the item type for a parked receive and `()` for a parked send.
pub struct OpCell<T> {
  state: RefCell<State<T>>,
  waker: Cell<Option<Waker>>,
  hook: Cell<Option<TransitionHook>>,
}

impl<T> fmt::Debug for OpCell<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match &*self.state.borrow() {
      State::Pending => "Pending",
      State::Settled(_) => "Settled",
      State::Taken => "Taken",
      State::Canceled => "Canceled",
    };
    f.debug_struct("OpCell").field("state", &state).finish_non_exhaustive()
  }
}

impl<T> OpCell<T> {
  pub fn new(hook: Option<TransitionHook>) -> Rc<Self> {
    Rc::new(OpCell {
      state: RefCell::new(State::Pending),
      waker: Cell::new(None),
      hook: Cell::new(hook),
    })
  }

  /// Settles the cell with a received value (or, for sends, with `()`).
  pub fn fulfill(&self, value: T) -> Result<(), CanceledError> {
    self.settle(Ok(value))
  }

  /// Settles the cell with the closed-channel outcome.
  pub fn reject(&self, err: ClosedError) -> Result<(), CanceledError> {
    self.settle(Err(err))
  }

  fn settle(&self, outcome: Outcome<T>) -> Result<(), CanceledError> {
    {
      let mut state = self.state.borrow_mut();
      match &*state {
        State::Pending => *state = State::Settled(outcome),
        State::Canceled => return Err(CanceledError),
        State::Settled(_) | State::Taken => panic!("channel operation settled twice"),
      }
    }

    // The state borrow is released before the observer runs: the observer is
    // free to cancel sibling cells or inspect any channel.
    self.fire_hook();
    if let Some(waker) = self.waker.take() {
      waker.wake();
    }
    Ok(())
  }

  /// Withdraws a pending operation. Idempotent; settled cells are untouched.
  ///
  /// The owning channel discards canceled entries the next time it dequeues
  /// or recomputes its length; no eager unlinking happens here.
  pub fn cancel(&self) {
    {
      let mut state = self.state.borrow_mut();
      if !matches!(&*state, State::Pending) {
        return;
      }
      *state = State::Canceled;
    }
    self.fire_hook();
  }

  pub fn is_canceled(&self) -> bool {
    matches!(&*self.state.borrow(), State::Canceled)
  }

  /// Parks the caller's waker until settlement, then yields the outcome once.
  ///
  /// Panics when polled again after the outcome was taken, or on a cell the
  /// caller itself canceled.
  pub fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Outcome<T>> {
    let mut state = self.state.borrow_mut();
    match &*state {
      State::Pending => {
        self.waker.set(Some(cx.waker().clone()));
        Poll::Pending
      }
      State::Settled(_) => {
        let State::Settled(outcome) = mem::replace(&mut *state, State::Taken) else {
          unreachable!()
        };
        Poll::Ready(outcome)
      }
      State::Taken => panic!("channel operation polled after completion"),
      State::Canceled => panic!("canceled channel operation polled"),
    }
  }

  /// Non-polling settlement check used by the select engine once a winner is
  /// known. Returns `None` while pending or after cancellation.
  pub fn take_now(&self) -> Option<Outcome<T>> {
    let mut state = self.state.borrow_mut();
    match &*state {
      State::Settled(_) => {
        let State::Settled(outcome) = mem::replace(&mut *state, State::Taken) else {
          unreachable!()
        };
        Some(outcome)
      }
      _ => None,
    }
  }

  fn fire_hook(&self) {
    if let Some(hook) = self.hook.take() {
      hook();
    }
  }
}

/// Cancellation facet of [`OpCell`], object-safe so one select group can hold
/// registrations of heterogeneous item types.
pub trait CancelOp {
  fn cancel_op(&self);
}

impl<T> CancelOp for OpCell<T> {
  fn cancel_op(&self) {
    self.cancel();
  }
}
