// src/select.rs

//! Waiting on several channel operations at once.
//!
//! A [`Select`] is built from clauses, each a receive from an
//! [`AsyncReceiver`] or a send to an [`AsyncSender`], paired with a handler
//! that turns the clause's result into the select's output. Awaiting it
//! completes exactly one clause: the first one, in declaration order, that can
//! make progress. The select is *biased*: when several clauses are ready at
//! the same time, the earliest declared wins.
//!
//! ```
//! # futures_executor::block_on(async {
//! use conveyor::{unbounded_async, Select};
//!
//! let (numbers_tx, numbers) = unbounded_async::<u32>();
//! let (words_tx, words) = unbounded_async::<&str>();
//! words_tx.try_send("hello").unwrap();
//! numbers_tx.try_send(7).unwrap();
//!
//! let picked = Select::new()
//!   .recv(&numbers, |r| format!("number {}", r.unwrap()))
//!   .recv(&words, |r| format!("word {}", r.unwrap()))
//!   .await;
//! assert_eq!(picked, "number 7");
//! # });
//! ```
//!
//! Clauses do not join the channel's waiting queues; a suspended select is
//! woken on every state change of the channels it watches and re-tries its
//! clauses. The counterpart of a select clause on a rendezvous channel must
//! therefore be a plain `send`/`recv`, not another select.

use crate::error::{RecvError, SendError, TryRecvError, TrySendError};
use crate::mpmc::core::{Interest, WatchToken};
use crate::mpmc::{AsyncReceiver, AsyncSender};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// One alternative of a select.
trait Clause<R> {
  /// Attempts the operation without waiting. `Some` means this clause
  /// completed and produced the select's output.
  fn try_complete(&mut self) -> Option<R>;

  /// Registers `waker` under `token` with the clause's channel. Returns
  /// `true` if the clause could already make progress.
  fn watch(&self, token: WatchToken, waker: &Waker) -> bool;

  /// Drops the registration made under `token`.
  fn unwatch(&self, token: WatchToken);
}

struct RecvClause<'a, T, F> {
  receiver: &'a AsyncReceiver<T>,
  handler: Option<F>,
}

impl<T, F, R> Clause<R> for RecvClause<'_, T, F>
where
  F: FnOnce(Result<T, RecvError>) -> R,
{
  fn try_complete(&mut self) -> Option<R> {
    if self.handler.is_none() {
      return None;
    }
    let result = match self.receiver.shared().try_recv() {
      Ok(item) => Ok(item),
      Err(TryRecvError::Closed) => Err(RecvError::Closed),
      Err(TryRecvError::Empty) => return None,
    };
    self.handler.take().map(|handler| handler(result))
  }

  fn watch(&self, token: WatchToken, waker: &Waker) -> bool {
    self.receiver.shared().watch(Interest::Recv, token, waker)
  }

  fn unwatch(&self, token: WatchToken) {
    self.receiver.shared().unwatch(token);
  }
}

struct SendClause<'a, T, F> {
  sender: &'a AsyncSender<T>,
  item: Option<T>,
  handler: Option<F>,
}

impl<T, F, R> Clause<R> for SendClause<'_, T, F>
where
  F: FnOnce(Result<(), SendError<T>>) -> R,
{
  fn try_complete(&mut self) -> Option<R> {
    let item = self.item.take()?;
    let result = match self.sender.shared().try_send(item) {
      Ok(()) => Ok(()),
      Err(TrySendError::Closed(item)) => Err(SendError(item)),
      Err(TrySendError::Full(item)) => {
        self.item = Some(item);
        return None;
      }
    };
    self.handler.take().map(|handler| handler(result))
  }

  fn watch(&self, token: WatchToken, waker: &Waker) -> bool {
    self.sender.shared().watch(Interest::Send, token, waker)
  }

  fn unwatch(&self, token: WatchToken) {
    self.sender.shared().unwatch(token);
  }
}

/// A biased select over channel operations. See the [module docs](self).
///
/// A select with no clauses never completes.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct Select<'a, R> {
  clauses: Vec<Box<dyn Clause<R> + Send + 'a>>,
  token: WatchToken,
  /// Set while the channels hold a waker registered under `token`.
  registered: bool,
  done: bool,
}

impl<'a, R> Select<'a, R> {
  /// Creates a select without clauses. Add them with [`recv`](Self::recv)
  /// and [`send`](Self::send), then `.await` it.
  pub fn new() -> Self {
    Self {
      clauses: Vec::new(),
      token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
      registered: false,
      done: false,
    }
  }

  /// Adds a receive clause. `handler` gets the received value, or
  /// [`RecvError::Closed`] once the channel is closed and drained.
  pub fn recv<T, F>(mut self, receiver: &'a AsyncReceiver<T>, handler: F) -> Self
  where
    T: Send + 'a,
    F: FnOnce(Result<T, RecvError>) -> R + Send + 'a,
  {
    self.clauses.push(Box::new(RecvClause {
      receiver,
      handler: Some(handler),
    }));
    self
  }

  /// Adds a send clause. `handler` gets `Ok(())` once `item` was accepted,
  /// or the item back inside [`SendError`] if the channel is closed.
  ///
  /// If another clause wins, `item` is dropped along with the select.
  pub fn send<T, F>(mut self, sender: &'a AsyncSender<T>, item: T, handler: F) -> Self
  where
    T: Send + 'a,
    F: FnOnce(Result<(), SendError<T>>) -> R + Send + 'a,
  {
    self.clauses.push(Box::new(SendClause {
      sender,
      item: Some(item),
      handler: Some(handler),
    }));
    self
  }

  /// Number of clauses added so far.
  pub fn len(&self) -> usize {
    self.clauses.len()
  }

  /// Returns `true` if no clause was added.
  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty()
  }
}

impl<R> Default for Select<'_, R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<R> Future for Select<'_, R> {
  type Output = R;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
    let this = self.get_mut();
    if this.done {
      return Poll::Pending;
    }

    loop {
      for clause in this.clauses.iter_mut() {
        if let Some(output) = clause.try_complete() {
          this.done = true;
          this.unregister();
          return Poll::Ready(output);
        }
      }

      // Register with every channel before giving up, so a change on any of
      // them wakes us. A clause that turned ready in the meantime means
      // another round.
      let mut ready = false;
      for clause in this.clauses.iter() {
        ready |= clause.watch(this.token, cx.waker());
      }
      this.registered = true;
      if !ready {
        return Poll::Pending;
      }
    }
  }
}

impl<R> Select<'_, R> {
  /// Removes this select's waker from every channel it watches.
  fn unregister(&mut self) {
    if std::mem::take(&mut self.registered) {
      for clause in self.clauses.iter() {
        clause.unwatch(self.token);
      }
    }
  }
}

impl<R> Drop for Select<'_, R> {
  fn drop(&mut self) {
    self.unregister();
  }
}

impl<R> fmt::Debug for Select<'_, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Select")
      .field("clauses", &self.clauses.len())
      .field("done", &self.done)
      .finish()
  }
}
