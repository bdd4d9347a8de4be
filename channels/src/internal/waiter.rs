use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::thread::{self, Thread};

/// Identifies one registered waiter inside a channel's waiting queues.
pub(crate) type WaiterId = u64;

/// How to resume a parked caller: unpark a blocked thread or wake an async task.
#[derive(Clone)]
pub(crate) enum Notify {
  Thread {
    thread: Thread,
    /// Set before `unpark` so the backoff loop can tell a real wakeup from a
    /// spurious one.
    notified: Arc<AtomicBool>,
  },
  Task(Waker),
}

impl Notify {
  /// A notifier for the calling thread, plus the flag it raises.
  pub(crate) fn current_thread() -> (Self, Arc<AtomicBool>) {
    let notified = Arc::new(AtomicBool::new(false));
    (
      Notify::Thread {
        thread: thread::current(),
        notified: Arc::clone(&notified),
      },
      notified,
    )
  }

  pub(crate) fn task(waker: &Waker) -> Self {
    Notify::Task(waker.clone())
  }

  pub(crate) fn wake(self) {
    match self {
      Notify::Thread { thread, notified } => {
        notified.store(true, Ordering::Release);
        thread.unpark();
      }
      Notify::Task(waker) => waker.wake(),
    }
  }

  /// Returns `true` if waking `self` would resume the same caller as `other`.
  pub(crate) fn will_wake(&self, other: &Notify) -> bool {
    match (self, other) {
      (Notify::Task(a), Notify::Task(b)) => a.will_wake(b),
      (Notify::Thread { notified: a, .. }, Notify::Thread { notified: b, .. }) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

impl fmt::Debug for Notify {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notify::Thread { thread, .. } => f.debug_tuple("Notify::Thread").field(&thread.id()).finish(),
      Notify::Task(_) => f.write_str("Notify::Task"),
    }
  }
}

/// Wakeups collected while the channel lock is held and fired after it is
/// released.
#[derive(Debug, Default)]
#[must_use = "collected wakeups must be fired"]
pub(crate) struct Wakeups(Vec<Notify>);

impl Wakeups {
  pub(crate) fn new() -> Self {
    Self(Vec::new())
  }

  pub(crate) fn push(&mut self, notify: Notify) {
    self.0.push(notify);
  }

  pub(crate) fn len(&self) -> usize {
    self.0.len()
  }

  pub(crate) fn extend_wakers(&mut self, wakers: impl IntoIterator<Item = Waker>) {
    self.0.extend(wakers.into_iter().map(Notify::Task));
  }

  pub(crate) fn fire(self) {
    for notify in self.0 {
      notify.wake();
    }
  }
}
