// src/error.rs

use core::fmt;

use thiserror::Error;

// Errors that hand the rejected value back share `into_inner` and a `Debug`
// that does not require `T: Debug`.
macro_rules! impl_value_carrying_error {
  ($name:ident < $generic:ident >, $($variant:ident),+ $(,)?) => {
    impl<$generic> $name<$generic> {
      /// Consumes the error, returning the value that could not be sent.
      #[inline]
      pub fn into_inner(self) -> $generic {
        match self {
          $( $name::$variant(v) => v, )+
        }
      }
    }

    impl<$generic> fmt::Debug for $name<$generic> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
          $( $name::$variant(_) => write!(f, concat!(stringify!($name), "::", stringify!($variant), "(..)")), )+
        }
      }
    }
  };
}

/// Error returned by `send` when the channel is closed for sending.
///
/// The value that could not be delivered is handed back to the caller.
#[derive(Error, PartialEq, Eq, Clone, Copy)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
  /// Consumes the error, returning the value that could not be sent.
  #[inline]
  pub fn into_inner(self) -> T {
    self.0
  }
}

impl<T> fmt::Debug for SendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SendError(..)")
  }
}

/// Error returned by `try_send` when the value could not be accepted right away.
#[derive(Error, PartialEq, Eq, Clone)]
pub enum TrySendError<T> {
  /// The buffer is full (or, for a rendezvous channel, no receiver is waiting)
  /// and the channel's overflow policy is `Suspend`.
  #[error("channel full")]
  Full(T),
  /// The channel is closed for sending.
  #[error("sending on a closed channel")]
  Closed(T),
}

impl_value_carrying_error!(TrySendError<T>, Full, Closed);

impl<T> TrySendError<T> {
  /// Returns `true` if the send failed because the channel was full.
  pub fn is_full(&self) -> bool {
    matches!(self, TrySendError::Full(_))
  }

  /// Returns `true` if the send failed because the channel was closed.
  pub fn is_closed(&self) -> bool {
    matches!(self, TrySendError::Closed(_))
  }
}

impl<T> From<SendError<T>> for TrySendError<T> {
  fn from(err: SendError<T>) -> Self {
    TrySendError::Closed(err.0)
  }
}

/// Error returned by a blocking `send_timeout`.
#[derive(Error, PartialEq, Eq, Clone)]
pub enum SendTimeoutError<T> {
  /// No room became available before the deadline.
  #[error("timed out waiting to send on channel")]
  Timeout(T),
  /// The channel is closed for sending.
  #[error("sending on a closed channel")]
  Closed(T),
}

impl_value_carrying_error!(SendTimeoutError<T>, Timeout, Closed);

/// Error returned by `recv` once the channel is closed and drained.
///
/// This is the end-of-stream signal, not a failure.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvError {
  #[error("receiving on a closed and empty channel")]
  Closed,
}

/// Error returned by `try_recv` when no value could be taken right away.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
  /// Nothing is buffered and no sender is waiting, but the channel is open.
  #[error("channel empty")]
  Empty,
  /// The channel is closed and drained.
  #[error("receiving on a closed and empty channel")]
  Closed,
}

/// Error returned by a blocking `recv_timeout`.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvTimeoutError {
  /// The timeout elapsed before a value arrived.
  #[error("timed out waiting on channel")]
  Timeout,
  /// The channel is closed and drained.
  #[error("receiving on a closed and empty channel")]
  Closed,
}

impl From<RecvError> for TryRecvError {
  fn from(_: RecvError) -> Self {
    TryRecvError::Closed
  }
}

impl From<RecvError> for RecvTimeoutError {
  fn from(_: RecvError) -> Self {
    RecvTimeoutError::Closed
  }
}

/// Errors raised while validating a [`ChannelConfig`](crate::ChannelConfig).
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
  /// A drop policy was combined with a rendezvous channel. A rendezvous
  /// channel has no buffer to evict from or refuse into, so only
  /// `OverflowPolicy::Suspend` is accepted.
  #[error("overflow policy {0:?} requires a buffered channel")]
  DropPolicyWithoutBuffer(crate::OverflowPolicy),
}
