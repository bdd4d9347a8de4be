// src/mpmc/async_impl.rs

//! Implementation of the asynchronous Future-based send and receive logic.
//!
//! Neither future is self-referential: a suspended operation is identified by
//! the `WaiterId` the core handed out, so both are `Unpin` and dropping one
//! at any point withdraws it from the channel.

use futures_core::{FusedFuture, Stream};

use super::core::{RecvAttempt, RecvOutcome, SendAttempt, SendCancel, SendOutcome, Shared};
use super::AsyncReceiver;
use crate::error::{RecvError, SendError};
use crate::internal::waiter::{Notify, WaiterId};

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

// --- SendFuture ---

enum SendState<T> {
  Start(T),
  Waiting(WaiterId),
  Done,
}

/// A future that completes once the value has been buffered, handed to a
/// receiver or dropped by the overflow policy, or the channel turns out to
/// be closed.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct SendFuture<'a, T> {
  shared: &'a Shared<T>,
  state: SendState<T>,
}

// The value is never pinned structurally.
impl<T> Unpin for SendFuture<'_, T> {}

impl<'a, T> SendFuture<'a, T> {
  pub(super) fn new(shared: &'a Shared<T>, item: T) -> Self {
    Self {
      shared,
      state: SendState::Start(item),
    }
  }
}

impl<T> Future for SendFuture<'_, T> {
  type Output = Result<(), SendError<T>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match mem::replace(&mut this.state, SendState::Done) {
      SendState::Start(item) => match this.shared.start_send(item, Notify::task(cx.waker())) {
        SendAttempt::Done => Poll::Ready(Ok(())),
        SendAttempt::Closed(item) => Poll::Ready(Err(SendError(item))),
        SendAttempt::Waiting(id) => {
          this.state = SendState::Waiting(id);
          Poll::Pending
        }
      },
      SendState::Waiting(id) => match this.shared.poll_send(id, Notify::task(cx.waker())) {
        Some(SendOutcome::Sent) => Poll::Ready(Ok(())),
        Some(SendOutcome::Rejected(item)) => Poll::Ready(Err(SendError(item))),
        None => {
          this.state = SendState::Waiting(id);
          Poll::Pending
        }
      },
      // Polled again after completion.
      SendState::Done => Poll::Ready(Ok(())),
    }
  }
}

impl<T> FusedFuture for SendFuture<'_, T> {
  fn is_terminated(&self) -> bool {
    matches!(self.state, SendState::Done)
  }
}

impl<T> Drop for SendFuture<'_, T> {
  fn drop(&mut self) {
    if let SendState::Waiting(id) = self.state {
      // A withdrawn value is dropped here, after the lock is released.
      if let SendCancel::Withdrawn(item) = self.shared.cancel_send(id) {
        drop(item);
      }
    }
  }
}

impl<T> fmt::Debug for SendFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match self.state {
      SendState::Start(_) => "start",
      SendState::Waiting(_) => "waiting",
      SendState::Done => "done",
    };
    f.debug_struct("SendFuture").field("state", &state).finish()
  }
}

// --- RecvFuture ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecvState {
  Start,
  Waiting(WaiterId),
  Done,
}

/// A future that completes with the next value, or with [`RecvError::Closed`]
/// once the channel is closed and drained.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvFuture<'a, T> {
  shared: &'a Shared<T>,
  state: RecvState,
}

impl<'a, T> RecvFuture<'a, T> {
  pub(super) fn new(shared: &'a Shared<T>) -> Self {
    Self {
      shared,
      state: RecvState::Start,
    }
  }
}

/// Shared by `RecvFuture` and the `Stream` impl: drives one receive through
/// its states.
fn poll_recv_state<T>(shared: &Shared<T>, state: &mut RecvState, cx: &mut Context<'_>) -> Poll<Result<T, RecvError>> {
  match mem::replace(state, RecvState::Done) {
    RecvState::Start => match shared.start_recv(Notify::task(cx.waker())) {
      RecvAttempt::Value(item) => Poll::Ready(Ok(item)),
      RecvAttempt::Closed => Poll::Ready(Err(RecvError::Closed)),
      RecvAttempt::Waiting(id) => {
        *state = RecvState::Waiting(id);
        Poll::Pending
      }
    },
    RecvState::Waiting(id) => match shared.poll_recv(id, Notify::task(cx.waker())) {
      Some(RecvOutcome::Value(item)) => Poll::Ready(Ok(item)),
      Some(RecvOutcome::Closed) => Poll::Ready(Err(RecvError::Closed)),
      None => {
        *state = RecvState::Waiting(id);
        Poll::Pending
      }
    },
    RecvState::Done => Poll::Ready(Err(RecvError::Closed)),
  }
}

impl<T> Future for RecvFuture<'_, T> {
  type Output = Result<T, RecvError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    poll_recv_state(this.shared, &mut this.state, cx)
  }
}

impl<T> FusedFuture for RecvFuture<'_, T> {
  fn is_terminated(&self) -> bool {
    self.state == RecvState::Done
  }
}

impl<T> Drop for RecvFuture<'_, T> {
  fn drop(&mut self) {
    if let RecvState::Waiting(id) = self.state {
      self.shared.cancel_recv_and_reclaim(id);
    }
  }
}

impl<T> fmt::Debug for RecvFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecvFuture").field("state", &self.state).finish()
  }
}

// --- Stream ---

/// Per-receiver bookkeeping for the `Stream` impl: the receive currently in
/// flight, if any.
#[derive(Debug)]
pub(super) struct StreamSlot(RecvState);

impl StreamSlot {
  pub(super) fn new() -> Self {
    StreamSlot(RecvState::Start)
  }

  /// Withdraws the in-flight receive, if any.
  pub(super) fn cancel<T>(&mut self, shared: &Shared<T>) {
    if let RecvState::Waiting(id) = mem::replace(&mut self.0, RecvState::Start) {
      shared.cancel_recv_and_reclaim(id);
    }
  }
}

impl<T> Stream for AsyncReceiver<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    let poll = poll_recv_state(&this.shared, &mut this.stream.0, cx);
    if poll.is_ready() {
      // Each item is a fresh receive; `Done` would end the stream early.
      this.stream.0 = RecvState::Start;
    }
    poll.map(Result::ok)
  }
}
