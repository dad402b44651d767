// src/select/mod.rs

//! Wait on several channel operations at once; commit exactly one.
//!
//! A select call takes an ordered list of descriptors built with [`recv`],
//! [`recv_with`], [`send`] and [`send_with`]. The first descriptor whose
//! channel is already ready executes synchronously — earlier entries win
//! ties, deterministically. When none is ready, every descriptor parks on its
//! channel and the call suspends until one settles; at that instant all other
//! registrations are withdrawn, so exactly one commit callback ever runs and
//! no channel is left holding a stale registration.
//!
//! There is no fairness guarantee *between* independent select calls, and a
//! registration belongs to exactly one select call.
//!
//! # Examples
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use strand::{unbounded, Channel};
//! use strand::select::{self, recv_with, send};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap()
//! #   .block_on(tokio::task::LocalSet::new().run_until(async {
//! let numbers = unbounded::<u32>();
//! let words = unbounded::<&str>();
//! numbers.send(7).await.unwrap();
//!
//! let got = Rc::new(Cell::new(None));
//! let seen = got.clone();
//! select::select([
//!   recv_with(&numbers, move |n| seen.set(n.ok())),
//!   send(&words, "never sent"),
//! ])
//! .await;
//!
//! assert_eq!(got.get(), Some(7));
//! assert_eq!(words.len(), 0); // the losing descriptor never touched it
//! # }));
//! ```

mod core;

use self::core::{ErasedOp, Group, RecvOp, Registered, SendOp};
use crate::channel::Channel;
use crate::error::ClosedError;
use crate::telemetry;

use ::core::future::Future;
use ::core::pin::Pin;
use ::core::task::{Context, Poll};
use std::fmt;
use std::mem;
use std::rc::Rc;

const LOC_SELECT: &str = "select";

const CTR_FAST_COMMITS: &str = "FastCommits";
const CTR_RACES: &str = "Races";

/// One channel operation a select call may commit: a receive, or a send of a
/// specific value, with an optional commit callback.
#[must_use = "a descriptor does nothing until passed to select"]
pub struct SelectOp {
  inner: Box<dyn ErasedOp>,
}

impl fmt::Debug for SelectOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SelectOp").finish_non_exhaustive()
  }
}

/// Descriptor for receiving from `channel`. The received value is discarded;
/// use [`recv_with`] to observe it.
pub fn recv<T, C>(channel: &C) -> SelectOp
where
  T: 'static,
  C: Channel<T> + Clone + 'static,
{
  SelectOp {
    inner: Box::new(RecvOp {
      chan: channel.clone(),
      on_commit: None,
    }),
  }
}

/// Descriptor for receiving from `channel`.
///
/// If this descriptor is the one committed, `on_commit` receives `Ok(value)`
/// on success or `Err(ClosedError)` when the channel closed; a canceled
/// (losing) descriptor never invokes it.
pub fn recv_with<T, C, F>(channel: &C, on_commit: F) -> SelectOp
where
  T: 'static,
  C: Channel<T> + Clone + 'static,
  F: FnOnce(Result<T, ClosedError>) + 'static,
{
  SelectOp {
    inner: Box::new(RecvOp {
      chan: channel.clone(),
      on_commit: Some(Box::new(on_commit)),
    }),
  }
}

/// Descriptor for sending `value` into `channel`.
pub fn send<T, C>(channel: &C, value: T) -> SelectOp
where
  T: 'static,
  C: Channel<T> + Clone + 'static,
{
  SelectOp {
    inner: Box::new(SendOp {
      chan: channel.clone(),
      value,
      on_commit: None,
    }),
  }
}

/// Descriptor for sending `value` into `channel`, with a commit callback.
///
/// `on_commit` receives `Ok(())` when the value was delivered or buffered,
/// `Err(ClosedError)` when the channel closed first; a canceled (losing)
/// descriptor never invokes it, and its value is dropped.
pub fn send_with<T, C, F>(channel: &C, value: T, on_commit: F) -> SelectOp
where
  T: 'static,
  C: Channel<T> + Clone + 'static,
  F: FnOnce(Result<(), ClosedError>) + 'static,
{
  SelectOp {
    inner: Box::new(SendOp {
      chan: channel.clone(),
      value,
      on_commit: Some(Box::new(on_commit)),
    }),
  }
}

/// Waits until one of `ops` commits.
///
/// An empty list (with nothing to commit) waits forever; that is the
/// intended degenerate case, mirroring a select over no channels. Use
/// [`select_or`] for a non-blocking poll.
///
/// Dropping the returned future withdraws every registration it made.
pub fn select<I>(ops: I) -> Select
where
  I: IntoIterator<Item = SelectOp>,
{
  Select {
    state: SelectState::Scan(ops.into_iter().collect()),
  }
}

/// Non-blocking poll over `ops`: commits the first ready descriptor, or —
/// when none is ready — invokes `fallback` without touching any channel.
///
/// Never suspends, which is why it is a plain call and not a future.
pub fn select_or<I, F>(ops: I, fallback: F)
where
  I: IntoIterator<Item = SelectOp>,
  F: FnOnce(),
{
  for op in ops {
    if op.inner.is_ready() {
      telemetry::increment_counter(LOC_SELECT, CTR_FAST_COMMITS);
      op.inner.commit_now();
      return;
    }
  }
  fallback();
}

/// Future returned by [`select`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct Select {
  state: SelectState,
}

enum SelectState {
  Scan(Vec<SelectOp>),
  Parked {
    group: Rc<Group>,
    parked: Vec<Option<Box<dyn Registered>>>,
  },
  Done,
}

impl fmt::Debug for Select {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match &self.state {
      SelectState::Scan(_) => "Scan",
      SelectState::Parked { .. } => "Parked",
      SelectState::Done => "Done",
    };
    f.debug_struct("Select").field("state", &state).finish_non_exhaustive()
  }
}

impl Future for Select {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    let this = self.get_mut();

    loop {
      match mem::replace(&mut this.state, SelectState::Done) {
        SelectState::Scan(mut ops) => {
          // Deterministic fast path: first ready descriptor in list order.
          if let Some(index) = ops.iter().position(|op| op.inner.is_ready()) {
            let op = ops.swap_remove(index);
            telemetry::increment_counter(LOC_SELECT, CTR_FAST_COMMITS);
            op.inner.commit_now();
            return Poll::Ready(());
          }

          // Park every descriptor and race. A registration can settle while
          // we are still here (the channel closed under it); once a winner
          // exists the remaining descriptors are never registered at all.
          telemetry::increment_counter(LOC_SELECT, CTR_RACES);
          let group = Group::new();
          let mut parked: Vec<Option<Box<dyn Registered>>> = Vec::with_capacity(ops.len());
          for op in ops {
            if group.winner().is_some() {
              break;
            }
            let index = parked.len();
            parked.push(Some(op.inner.register(&group, index)));
          }
          this.state = SelectState::Parked { group, parked };
        }
        SelectState::Parked { group, mut parked } => {
          if let Some(index) = group.winner() {
            let winner = parked[index].take().expect("winner finished once");
            // Every sibling was withdrawn the instant the winner settled;
            // only now does its commit callback run.
            winner.finish();
            return Poll::Ready(());
          }
          group.park(cx.waker());
          this.state = SelectState::Parked { group, parked };
          return Poll::Pending;
        }
        SelectState::Done => panic!("select polled after completion"),
      }
    }
  }
}

impl Drop for Select {
  fn drop(&mut self) {
    if let SelectState::Parked { parked, .. } = &self.state {
      for registration in parked.iter().flatten() {
        registration.cancel();
      }
    }
  }
}
