// src/mpmc/mod.rs

//! A lock-based MPMC (multi-sender, multi-receiver) channel with a configurable
//! capacity and overflow policy.
//!
//! The channel is a single `parking_lot::Mutex`-guarded core shared by four kinds
//! of handles. `AsyncSender`/`AsyncReceiver` suspend the calling task without
//! holding an OS thread; `Sender`/`Receiver` block the calling thread with an
//! adaptive backoff. All of them can be mixed on one channel: a blocking producer
//! can feed async consumers and vice versa, and they share the same FIFO waiting
//! queues, so fairness does not depend on which kind of handle is waiting.
//!
//! ### Semantics at a glance
//!
//! - **send**: hands the value to the longest-waiting receiver if there is one,
//!   else buffers it if there is room, else applies the [`OverflowPolicy`]
//!   (suspend, evict the oldest value, or discard the new one).
//! - **recv**: takes the oldest buffered value (refilling the slot from the
//!   longest-waiting sender), else takes a waiting sender's value directly, else
//!   suspends until a value or the close signal arrives.
//! - **close**: channel-wide and idempotent. Buffered values stay receivable;
//!   waiting receivers are told the channel is closed, waiting senders get their
//!   values back. Dropping the last sender, or the last receiver, closes too.
//! - **fan-out / fan-in**: every value goes to exactly one receiver, in the order
//!   receivers started waiting; per-producer order is preserved.

use crate::config::{Capacity, ChannelConfig, OverflowPolicy};
use crate::error::{
  ConfigError, RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};

// Re-export the futures for the public API, allowing users to `await` on sends/receives.
pub use self::async_impl::{RecvFuture, SendFuture};
pub use self::core::ChannelStats;

mod async_impl;
mod backoff;
pub(crate) mod core;
mod sync_impl;

use self::async_impl::StreamSlot;
use self::core::Shared;
use std::sync::Arc;
use std::time::{Duration, Instant};

// --- Public Structs (Sync) ---

/// A blocking sending handle.
///
/// Senders can be cloned to create multiple producers. When all senders for a
/// channel are dropped the channel is closed.
#[derive(Debug)]
pub struct Sender<T> {
  shared: Arc<Shared<T>>,
}

/// A blocking receiving handle.
///
/// Receivers can be cloned to create multiple consumers; each value is delivered
/// to exactly one of them.
#[derive(Debug)]
pub struct Receiver<T> {
  shared: Arc<Shared<T>>,
}

// --- Public Structs (Async) ---

/// An asynchronous sending handle.
///
/// Senders can be cloned to create multiple producers. When all senders for a
/// channel are dropped the channel is closed.
#[derive(Debug)]
pub struct AsyncSender<T> {
  shared: Arc<Shared<T>>,
}

/// An asynchronous receiving handle. Also a [`Stream`](futures_core::Stream)
/// that ends once the channel is closed and drained.
///
/// Receivers can be cloned to create multiple consumers; each value is delivered
/// to exactly one of them.
#[derive(Debug)]
pub struct AsyncReceiver<T> {
  shared: Arc<Shared<T>>,
  stream: StreamSlot,
}

// --- Channel Constructors ---

fn new_shared<T>(config: ChannelConfig) -> Result<Arc<Shared<T>>, ConfigError> {
  let config = config.validate()?;
  Ok(Arc::new(Shared::new(config.capacity, config.overflow)))
}

fn sync_pair<T>(shared: Arc<Shared<T>>) -> (Sender<T>, Receiver<T>) {
  (
    Sender {
      shared: Arc::clone(&shared),
    },
    Receiver { shared },
  )
}

fn async_pair<T>(shared: Arc<Shared<T>>) -> (AsyncSender<T>, AsyncReceiver<T>) {
  (
    AsyncSender {
      shared: Arc::clone(&shared),
    },
    AsyncReceiver {
      shared,
      stream: StreamSlot::new(),
    },
  )
}

/// Suspend-policy channels are always valid.
fn suspending<T>(capacity: Capacity) -> Arc<Shared<T>> {
  Arc::new(Shared::new(capacity, OverflowPolicy::Suspend))
}

/// Creates an asynchronous channel from a [`ChannelConfig`].
///
/// # Errors
///
/// [`ConfigError::DropPolicyWithoutBuffer`] for a drop policy on a rendezvous
/// channel.
pub fn with_config<T>(config: ChannelConfig) -> Result<(AsyncSender<T>, AsyncReceiver<T>), ConfigError> {
  new_shared(config).map(async_pair)
}

/// Creates a blocking channel from a [`ChannelConfig`].
///
/// # Errors
///
/// See [`with_config`].
pub fn with_config_sync<T>(config: ChannelConfig) -> Result<(Sender<T>, Receiver<T>), ConfigError> {
  new_shared(config).map(sync_pair)
}

/// Creates a blocking channel buffering up to `capacity` values.
///
/// A capacity of `0` creates a rendezvous channel, where a `send` blocks until a
/// `recv` takes the value.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
  sync_pair(suspending(Capacity::Bounded(capacity)))
}

/// Creates a blocking channel whose sends never wait.
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
  sync_pair(suspending(Capacity::Unlimited))
}

/// Creates a blocking rendezvous channel.
pub fn rendezvous<T>() -> (Sender<T>, Receiver<T>) {
  sync_pair(suspending(Capacity::Rendezvous))
}

/// Creates an asynchronous channel buffering up to `capacity` values.
///
/// A capacity of `0` creates a rendezvous channel, where `send().await` does not
/// complete until a receiver has taken the value.
pub fn bounded_async<T>(capacity: usize) -> (AsyncSender<T>, AsyncReceiver<T>) {
  async_pair(suspending(Capacity::Bounded(capacity)))
}

/// Creates an asynchronous channel whose sends never suspend.
pub fn unbounded_async<T>() -> (AsyncSender<T>, AsyncReceiver<T>) {
  async_pair(suspending(Capacity::Unlimited))
}

/// Creates an asynchronous rendezvous channel.
pub fn rendezvous_async<T>() -> (AsyncSender<T>, AsyncReceiver<T>) {
  async_pair(suspending(Capacity::Rendezvous))
}

/// Creates an asynchronous channel of the default buffered size
/// ([`DEFAULT_BUFFER_CAPACITY`](crate::DEFAULT_BUFFER_CAPACITY)).
pub fn buffered_async<T>() -> (AsyncSender<T>, AsyncReceiver<T>) {
  async_pair(suspending(Capacity::buffered()))
}

/// Creates an asynchronous channel that only keeps the most recent value:
/// one slot, and each send replaces whatever is still unread.
pub fn conflated_async<T>() -> (AsyncSender<T>, AsyncReceiver<T>) {
  async_pair(Arc::new(Shared::new(Capacity::Bounded(1), OverflowPolicy::DropOldest)))
}

// --- Shared handle behaviour ---

macro_rules! impl_handle_common {
  ($handle:ident) => {
    impl<T> $handle<T> {
      /// Closes the channel for sending. Values already buffered stay
      /// receivable; waiting receivers are told the channel is closed once
      /// nothing is left for them.
      ///
      /// Idempotent. Returns `true` only for the call that closed the channel.
      pub fn close(&self) -> bool {
        self.shared.close()
      }

      /// Returns `true` once the channel is closed for sending.
      pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
      }

      /// Returns the number of values currently buffered.
      /// For rendezvous channels, this is always 0.
      #[inline]
      pub fn len(&self) -> usize {
        self.shared.len()
      }

      /// Returns `true` if nothing is buffered.
      #[inline]
      pub fn is_empty(&self) -> bool {
        self.len() == 0
      }

      /// Returns `true` if the buffer is full.
      /// For unlimited channels, this is always `false`; for rendezvous
      /// channels, always `true`.
      #[inline]
      pub fn is_full(&self) -> bool {
        self.shared.is_full()
      }

      /// Returns the channel's capacity.
      pub fn capacity(&self) -> Capacity {
        self.shared.capacity()
      }

      /// Returns the channel's overflow policy.
      pub fn overflow_policy(&self) -> OverflowPolicy {
        self.shared.overflow()
      }

      /// Returns a snapshot of the channel's counters.
      pub fn stats(&self) -> ChannelStats {
        self.shared.stats()
      }
    }
  };
}

impl_handle_common!(Sender);
impl_handle_common!(Receiver);
impl_handle_common!(AsyncSender);
impl_handle_common!(AsyncReceiver);

// --- Clone / Drop ---

impl<T> Clone for Sender<T> {
  fn clone(&self) -> Self {
    self.shared.add_sender();
    Sender {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> Clone for Receiver<T> {
  fn clone(&self) -> Self {
    self.shared.add_receiver();
    Receiver {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> Clone for AsyncSender<T> {
  fn clone(&self) -> Self {
    self.shared.add_sender();
    AsyncSender {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> Clone for AsyncReceiver<T> {
  fn clone(&self) -> Self {
    self.shared.add_receiver();
    AsyncReceiver {
      shared: Arc::clone(&self.shared),
      stream: StreamSlot::new(),
    }
  }
}

impl<T> Drop for Sender<T> {
  fn drop(&mut self) {
    self.shared.remove_sender();
  }
}

impl<T> Drop for Receiver<T> {
  fn drop(&mut self) {
    self.shared.remove_receiver();
  }
}

impl<T> Drop for AsyncSender<T> {
  fn drop(&mut self) {
    self.shared.remove_sender();
  }
}

impl<T> Drop for AsyncReceiver<T> {
  fn drop(&mut self) {
    self.stream.cancel(&self.shared);
    self.shared.remove_receiver();
  }
}

// --- Public API Method Implementations (Sync) ---

impl<T> Sender<T> {
  /// Sends a value, blocking the current thread while the channel is full.
  ///
  /// # Errors
  ///
  /// `SendError` carrying the value if the channel is (or becomes) closed
  /// before the value is accepted.
  pub fn send(&self, item: T) -> Result<(), SendError<T>> {
    sync_impl::send_blocking(&self.shared, item, None).map_err(|e| SendError(e.into_inner()))
  }

  /// Sends a value, blocking for at most `timeout`. On timeout the value was
  /// not delivered and is handed back.
  pub fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
    sync_impl::send_blocking(&self.shared, item, Some(Instant::now() + timeout))
  }

  /// Attempts to send a value without blocking.
  pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    self.shared.try_send(item)
  }

  /// Converts this blocking `Sender` into an `AsyncSender` for the same channel.
  pub fn to_async(self) -> AsyncSender<T> {
    self.shared.add_sender();
    AsyncSender {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> Receiver<T> {
  /// Receives a value, blocking the current thread until one arrives.
  ///
  /// # Errors
  ///
  /// `RecvError::Closed` once the channel is closed and drained.
  pub fn recv(&self) -> Result<T, RecvError> {
    sync_impl::recv_blocking(&self.shared, None).map_err(|_| RecvError::Closed)
  }

  /// Receives a value, blocking for at most `timeout`.
  pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
    sync_impl::recv_blocking(&self.shared, Some(Instant::now() + timeout))
  }

  /// Attempts to receive a value without blocking.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    self.shared.try_recv()
  }

  /// A blocking iterator that ends once the channel is closed and drained.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter { receiver: self }
  }

  /// A non-blocking iterator over the values available right now.
  pub fn try_iter(&self) -> TryIter<'_, T> {
    TryIter { receiver: self }
  }

  /// Converts this blocking `Receiver` into an `AsyncReceiver` for the same channel.
  pub fn to_async(self) -> AsyncReceiver<T> {
    self.shared.add_receiver();
    AsyncReceiver {
      shared: Arc::clone(&self.shared),
      stream: StreamSlot::new(),
    }
  }
}

// --- Public API Method Implementations (Async) ---

impl<T> AsyncSender<T> {
  /// Sends a value, suspending while the channel is full.
  ///
  /// Dropping the returned future before it completes withdraws the value;
  /// it is never delivered.
  pub fn send(&self, item: T) -> SendFuture<'_, T> {
    SendFuture::new(&self.shared, item)
  }

  /// Attempts to send a value without suspending.
  pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    self.shared.try_send(item)
  }

  /// Converts this `AsyncSender` into a blocking `Sender` for the same channel.
  pub fn to_sync(self) -> Sender<T> {
    self.shared.add_sender();
    Sender {
      shared: Arc::clone(&self.shared),
    }
  }

  pub(crate) fn shared(&self) -> &Shared<T> {
    &self.shared
  }
}

impl<T> AsyncReceiver<T> {
  /// Receives the next value, suspending until one arrives.
  ///
  /// Dropping the returned future before it completes leaves no trace: a
  /// value handed to it in the meantime goes back to the channel.
  pub fn recv(&self) -> RecvFuture<'_, T> {
    RecvFuture::new(&self.shared)
  }

  /// Attempts to receive a value without suspending.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    self.shared.try_recv()
  }

  /// Converts this `AsyncReceiver` into a blocking `Receiver` for the same channel.
  pub fn to_sync(self) -> Receiver<T> {
    self.shared.add_receiver();
    Receiver {
      shared: Arc::clone(&self.shared),
    }
  }

  pub(crate) fn shared(&self) -> &Shared<T> {
    &self.shared
  }
}

// --- Iterators ---

/// Blocking iterator returned by [`Receiver::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
  receiver: &'a Receiver<T>,
}

impl<T> Iterator for Iter<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.receiver.recv().ok()
  }
}

/// Non-blocking iterator returned by [`Receiver::try_iter`].
#[derive(Debug)]
pub struct TryIter<'a, T> {
  receiver: &'a Receiver<T>,
}

impl<T> Iterator for TryIter<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.receiver.try_recv().ok()
  }
}

/// Owning blocking iterator over a [`Receiver`].
#[derive(Debug)]
pub struct IntoIter<T> {
  receiver: Receiver<T>,
}

impl<T> Iterator for IntoIter<T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.receiver.recv().ok()
  }
}

impl<'a, T> IntoIterator for &'a Receiver<T> {
  type Item = T;
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl<T> IntoIterator for Receiver<T> {
  type Item = T;
  type IntoIter = IntoIter<T>;

  fn into_iter(self) -> Self::IntoIter {
    IntoIter { receiver: self }
  }
}
