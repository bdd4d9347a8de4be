//! Implementation of the synchronous, blocking send and receive logic.
//!
//! A blocking caller registers in the same waiting queues as async tasks, then
//! waits on its notify flag with an adaptive backoff (spin, yield, park).

use super::backoff;
use super::core::{RecvAttempt, RecvOutcome, SendAttempt, SendCancel, SendOutcome, Shared};
use crate::error::{RecvTimeoutError, SendTimeoutError};
use crate::internal::waiter::{Notify, WaiterId};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Waits until `notified` is raised, or until `deadline` if one is given.
/// Returns `false` on timeout.
fn wait(notified: &AtomicBool, deadline: Option<Instant>) -> bool {
  match deadline {
    None => {
      backoff::adaptive_wait(|| notified.load(Ordering::Acquire));
      true
    }
    Some(deadline) => backoff::adaptive_wait_until(|| notified.load(Ordering::Acquire), deadline),
  }
}

/// The blocking send. With a `deadline`, a send still queued when it passes
/// is withdrawn and its value handed back.
pub(crate) fn send_blocking<T>(
  shared: &Shared<T>,
  item: T,
  deadline: Option<Instant>,
) -> Result<(), SendTimeoutError<T>> {
  let (notify, notified) = Notify::current_thread();

  let id: WaiterId = match shared.start_send(item, notify.clone()) {
    SendAttempt::Done => return Ok(()),
    SendAttempt::Closed(item) => return Err(SendTimeoutError::Closed(item)),
    SendAttempt::Waiting(id) => id,
  };

  loop {
    if !wait(&notified, deadline) {
      return match shared.cancel_send(id) {
        SendCancel::Withdrawn(item) => Err(SendTimeoutError::Timeout(item)),
        SendCancel::Finished(SendOutcome::Sent) => Ok(()),
        SendCancel::Finished(SendOutcome::Rejected(item)) => Err(SendTimeoutError::Closed(item)),
      };
    }

    // Outcomes are posted before the flag is raised, so clearing it here
    // cannot lose a wakeup.
    notified.store(false, Ordering::Release);
    match shared.poll_send(id, notify.clone()) {
      Some(SendOutcome::Sent) => return Ok(()),
      Some(SendOutcome::Rejected(item)) => return Err(SendTimeoutError::Closed(item)),
      None => continue,
    }
  }
}

/// The blocking receive. With a `deadline`, a receive still queued when it
/// passes is withdrawn; one served in the meantime still returns its value.
pub(crate) fn recv_blocking<T>(shared: &Shared<T>, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
  let (notify, notified) = Notify::current_thread();

  let id: WaiterId = match shared.start_recv(notify.clone()) {
    RecvAttempt::Value(item) => return Ok(item),
    RecvAttempt::Closed => return Err(RecvTimeoutError::Closed),
    RecvAttempt::Waiting(id) => id,
  };

  loop {
    if !wait(&notified, deadline) {
      return match shared.cancel_recv(id) {
        None => Err(RecvTimeoutError::Timeout),
        Some(RecvOutcome::Value(item)) => Ok(item),
        Some(RecvOutcome::Closed) => Err(RecvTimeoutError::Closed),
      };
    }

    notified.store(false, Ordering::Release);
    match shared.poll_recv(id, notify.clone()) {
      Some(RecvOutcome::Value(item)) => return Ok(item),
      Some(RecvOutcome::Closed) => return Err(RecvTimeoutError::Closed),
      None => continue,
    }
  }
}
