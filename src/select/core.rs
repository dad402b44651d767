// src/select/core.rs

//! Arbitration machinery behind `select`.
//!
//! One `Group` exists per racing select call. Every registered operation
//! carries a transition observer pointing (weakly) back at the group; the
//! first observer to fire claims the win and synchronously cancels every
//! sibling registration, all before the winning outcome can reach the select
//! task. That closes the window in which a second counterpart operation,
//! running in the same scheduler turn, could settle a second registration.

use crate::channel::Channel;
use crate::error::ClosedError;
use crate::op::{CancelOp, OpCell, TransitionHook};

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::Waker;

pub(crate) type CommitRecv<T> = Box<dyn FnOnce(Result<T, ClosedError>)>;
pub(crate) type CommitSend = Box<dyn FnOnce(Result<(), ClosedError>)>;

/// Shared arbitration state of one racing select call.
///
/// `handles` is the registration table, indexed by descriptor position; the
/// select future reaches registrations through it only for cancellation, so
/// the entries are the type-erased cancel facet of each cell.
pub(crate) struct Group {
  winner: Cell<Option<usize>>,
  handles: RefCell<Vec<Rc<dyn CancelOp>>>,
  waker: Cell<Option<Waker>>,
}

impl Group {
  pub(crate) fn new() -> Rc<Self> {
    Rc::new(Group {
      winner: Cell::new(None),
      handles: RefCell::new(Vec::new()),
      waker: Cell::new(None),
    })
  }

  pub(crate) fn winner(&self) -> Option<usize> {
    self.winner.get()
  }

  pub(crate) fn park(&self, waker: &Waker) {
    self.waker.set(Some(waker.clone()));
  }

  fn add_handle(&self, handle: Rc<dyn CancelOp>) {
    self.handles.borrow_mut().push(handle);
  }

  /// First settlement wins; everyone else is withdrawn on the spot.
  ///
  /// Re-entrant calls (a sibling's own observer firing while we cancel it)
  /// see the winner already recorded and return before touching the table.
  fn settled(&self, index: usize) {
    if self.winner.get().is_some() {
      return;
    }
    self.winner.set(Some(index));

    {
      let handles = self.handles.borrow();
      for (i, handle) in handles.iter().enumerate() {
        if i != index {
          handle.cancel_op();
        }
      }
    }

    if let Some(waker) = self.waker.take() {
      waker.wake();
    }
  }

  /// Observer attached to the registration at `index`.
  fn transition_hook(self: &Rc<Self>, index: usize) -> TransitionHook {
    let group = Rc::downgrade(self);
    Box::new(move || {
      if let Some(group) = group.upgrade() {
        group.settled(index);
      }
    })
  }
}

/// A select descriptor with its item type erased.
pub(crate) trait ErasedOp {
  /// Readiness probe; derived from the channel's observable length and
  /// capacity, never from queue inspection.
  fn is_ready(&self) -> bool;

  /// Executes a ready operation synchronously and invokes its commit
  /// callback. Guaranteed not to suspend.
  fn commit_now(self: Box<Self>);

  /// Parks the operation on its channel, wired to the group at `index`.
  fn register(self: Box<Self>, group: &Rc<Group>, index: usize) -> Box<dyn Registered>;
}

/// A parked registration owned by the select future.
pub(crate) trait Registered {
  fn cancel(&self);

  /// Consumes the winner: takes the settled outcome and invokes the commit
  /// callback with it.
  fn finish(self: Box<Self>);
}

pub(crate) struct RecvOp<T, C: Channel<T>> {
  pub(crate) chan: C,
  pub(crate) on_commit: Option<CommitRecv<T>>,
}

impl<T: 'static, C: Channel<T>> ErasedOp for RecvOp<T, C> {
  fn is_ready(&self) -> bool {
    self.chan.recv_ready()
  }

  fn commit_now(self: Box<Self>) {
    let outcome = self.chan.commit_recv();
    if let Some(commit) = self.on_commit {
      commit(outcome);
    }
  }

  fn register(self: Box<Self>, group: &Rc<Group>, index: usize) -> Box<dyn Registered> {
    let op = self.chan.register_recv(Some(group.transition_hook(index)));
    group.add_handle(op.clone());
    Box::new(ParkedRecv {
      op,
      on_commit: self.on_commit,
    })
  }
}

struct ParkedRecv<T> {
  op: Rc<OpCell<T>>,
  on_commit: Option<CommitRecv<T>>,
}

impl<T> Registered for ParkedRecv<T> {
  fn cancel(&self) {
    self.op.cancel();
  }

  fn finish(self: Box<Self>) {
    let outcome = self.op.take_now().expect("select winner has settled");
    if let Some(commit) = self.on_commit {
      commit(outcome);
    }
  }
}

pub(crate) struct SendOp<T, C: Channel<T>> {
  pub(crate) chan: C,
  pub(crate) value: T,
  pub(crate) on_commit: Option<CommitSend>,
}

impl<T: 'static, C: Channel<T>> ErasedOp for SendOp<T, C> {
  fn is_ready(&self) -> bool {
    self.chan.send_ready()
  }

  fn commit_now(self: Box<Self>) {
    let this = *self;
    let outcome = this.chan.commit_send(this.value);
    if let Some(commit) = this.on_commit {
      commit(outcome);
    }
  }

  fn register(self: Box<Self>, group: &Rc<Group>, index: usize) -> Box<dyn Registered> {
    let this = *self;
    let op = this.chan.register_send(this.value, Some(group.transition_hook(index)));
    group.add_handle(op.clone());
    Box::new(ParkedSend {
      op,
      on_commit: this.on_commit,
    })
  }
}

struct ParkedSend {
  op: Rc<OpCell<()>>,
  on_commit: Option<CommitSend>,
}

impl Registered for ParkedSend {
  fn cancel(&self) {
    self.op.cancel();
  }

  fn finish(self: Box<Self>) {
    let outcome = self.op.take_now().expect("select winner has settled");
    if let Some(commit) = self.on_commit {
      commit(outcome);
    }
  }
}
