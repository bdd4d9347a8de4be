// src/mpmc/core.rs

//! The shared state of a channel and every transition applied to it.
//!
//! ### Design Principles:
//!
//! 1.  **Central Mutex**: one `parking_lot::Mutex` guards the buffer, both waiting
//!     queues, the pending outcomes and the closed flag. Every transition (offer,
//!     take, enqueue, cancel, close) runs under it, so the FIFO and fairness
//!     invariants that span those fields are never observed half-applied.
//! 2.  **Unified Waiter Queues**: blocked threads and suspended tasks wait in the
//!     same two queues (`pending_senders`, `pending_receivers`); the `Notify`
//!     stored with each entry knows how to resume it. Fairness therefore holds
//!     across the sync and async handles.
//! 3.  **Outcome Slots**: a waiter that is served (handed a value, had its value
//!     taken, or was closed out) is removed from its queue and its result is
//!     parked in an outcome map keyed by its `WaiterId`. The waiter collects it
//!     on its next poll. A waiter that is cancelled first is simply removed.
//! 4.  **Wake Outside the Lock**: wakeups are collected into `Wakeups` and fired
//!     after the guard is dropped.

use crate::config::{Capacity, OverflowPolicy};
use crate::error::{TryRecvError, TrySendError};
use crate::internal::waiter::{Notify, WaiterId, Wakeups};

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::task::Waker;

/// A suspended `send` and the value it is trying to deliver.
#[derive(Debug)]
struct PendingSend<T> {
  id: WaiterId,
  item: T,
  notify: Notify,
}

/// A suspended `recv`.
#[derive(Debug)]
struct PendingRecv {
  id: WaiterId,
  notify: Notify,
}

/// How a suspended send ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SendOutcome<T> {
  /// The value was buffered or handed to a receiver.
  Sent,
  /// The channel closed first; the value comes back.
  Rejected(T),
}

/// How a suspended receive ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RecvOutcome<T> {
  Value(T),
  Closed,
}

/// Result of starting a send.
#[derive(Debug)]
pub(crate) enum SendAttempt<T> {
  Done,
  Closed(T),
  Waiting(WaiterId),
}

/// Result of starting a receive.
#[derive(Debug)]
pub(crate) enum RecvAttempt<T> {
  Value(T),
  Closed,
  Waiting(WaiterId),
}

/// Result of withdrawing a suspended send.
#[derive(Debug)]
pub(crate) enum SendCancel<T> {
  /// Still queued: the value was removed and never delivered.
  Withdrawn(T),
  /// Already served before the withdrawal.
  Finished(SendOutcome<T>),
}

/// Identifies one select across all the channels it watches.
pub(crate) type WatchToken = u64;

/// What a select clause is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interest {
  Send,
  Recv,
}

/// Point-in-time counters for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
  /// Sends accepted by the channel, including values later lost to the
  /// overflow policy.
  pub sent: u64,
  /// Values handed to a receiver.
  pub received: u64,
  /// Values lost to `DropOldest` / `DropLatest`.
  pub dropped: u64,
  /// Values currently buffered.
  pub buffered: usize,
  /// Senders suspended or blocked on a full channel.
  pub waiting_senders: usize,
  /// Receivers suspended or blocked on an empty channel.
  pub waiting_receivers: usize,
}

/// The core state of a channel, protected by a single `Mutex`.
#[derive(Debug)]
pub(crate) struct ChannelState<T> {
  /// Buffered values, oldest first. Never longer than the capacity.
  buffer: VecDeque<T>,
  /// Values handed to a receiver that was cancelled before it observed them.
  /// Drained ahead of `buffer` and not counted against the capacity.
  reclaimed: VecDeque<T>,
  pending_senders: VecDeque<PendingSend<T>>,
  pending_receivers: VecDeque<PendingRecv>,
  send_outcomes: HashMap<WaiterId, SendOutcome<T>>,
  recv_outcomes: HashMap<WaiterId, RecvOutcome<T>>,
  /// `RecvOutcome::Value`s in `recv_outcomes` not yet collected. A closed
  /// channel is not drained while any of them may still be reclaimed.
  in_flight: usize,
  /// Select futures interested in any change of state.
  watchers: Vec<(WatchToken, Waker)>,
  closed: bool,
  pub(crate) sender_count: usize,
  pub(crate) receiver_count: usize,
  next_waiter: WaiterId,
  sent: u64,
  received: u64,
  dropped: u64,
}

impl<T> ChannelState<T> {
  fn next_id(&mut self) -> WaiterId {
    let id = self.next_waiter;
    self.next_waiter = self.next_waiter.wrapping_add(1);
    id
  }

  fn wake_watchers(&mut self, wakeups: &mut Wakeups) {
    if !self.watchers.is_empty() {
      wakeups.extend_wakers(self.watchers.drain(..).map(|(_, waker)| waker));
    }
  }

  /// Closed, and no value is buffered, reclaimed or handed out uncollected.
  fn drained(&self) -> bool {
    self.closed && self.in_flight == 0 && self.reclaimed.is_empty() && self.buffer.is_empty()
  }

  /// Hands `item` to the oldest waiting receiver.
  fn hand_off(&mut self, item: T, wakeups: &mut Wakeups) -> Result<(), T> {
    match self.pending_receivers.pop_front() {
      Some(receiver) => {
        self.recv_outcomes.insert(receiver.id, RecvOutcome::Value(item));
        self.in_flight += 1;
        wakeups.push(receiver.notify);
        Ok(())
      }
      None => Err(item),
    }
  }

  /// Removes and returns the outcome posted for `id`, if any.
  fn collect_recv(&mut self, id: WaiterId) -> Option<RecvOutcome<T>> {
    let outcome = self.recv_outcomes.remove(&id)?;
    if matches!(outcome, RecvOutcome::Value(_)) {
      self.in_flight -= 1;
    }
    Some(outcome)
  }

  /// Once a closed channel is drained, receivers still waiting on it are
  /// told so.
  fn settle_if_drained(&mut self, wakeups: &mut Wakeups) {
    if !self.drained() {
      return;
    }
    for receiver in std::mem::take(&mut self.pending_receivers) {
      self.recv_outcomes.insert(receiver.id, RecvOutcome::Closed);
      wakeups.push(receiver.notify);
    }
    self.wake_watchers(wakeups);
  }
}

/// The shared owner of the channel's state, designed to be wrapped in an `Arc`.
#[derive(Debug)]
pub(crate) struct Shared<T> {
  state: Mutex<ChannelState<T>>,
  /// Buffer limit; `0` is rendezvous and `usize::MAX` is unlimited.
  capacity: usize,
  overflow: OverflowPolicy,
}

impl<T> Shared<T> {
  /// Creates the shared core with one sender and one receiver registered.
  /// The caller is responsible for passing a validated policy.
  pub(crate) fn new(capacity: Capacity, overflow: OverflowPolicy) -> Self {
    let capacity = capacity.limit();
    Shared {
      state: Mutex::new(ChannelState {
        buffer: VecDeque::with_capacity(capacity.min(32)),
        reclaimed: VecDeque::new(),
        pending_senders: VecDeque::new(),
        pending_receivers: VecDeque::new(),
        send_outcomes: HashMap::new(),
        recv_outcomes: HashMap::new(),
        in_flight: 0,
        watchers: Vec::new(),
        closed: false,
        sender_count: 1,
        receiver_count: 1,
        next_waiter: 0,
        sent: 0,
        received: 0,
        dropped: 0,
      }),
      capacity,
      overflow,
    }
  }

  pub(crate) fn capacity(&self) -> Capacity {
    Capacity::from_limit(self.capacity)
  }

  pub(crate) fn overflow(&self) -> OverflowPolicy {
    self.overflow
  }

  // --- Transitions (called with the lock held) ---

  /// Accepts `item` without suspending if the channel's rules allow it.
  ///
  /// Tries, in order: hand-off to the oldest waiting receiver, append to the
  /// buffer, then the overflow policy. Returns the item if the sender must wait.
  fn offer(&self, st: &mut ChannelState<T>, item: T, wakeups: &mut Wakeups) -> Result<(), T> {
    // A waiting receiver implies an empty buffer: hand off directly.
    let item = match st.hand_off(item, wakeups) {
      Ok(()) => return Ok(()),
      Err(item) => item,
    };

    if st.buffer.len() < self.capacity {
      st.buffer.push_back(item);
      st.wake_watchers(wakeups);
      return Ok(());
    }

    match self.overflow {
      OverflowPolicy::Suspend => Err(item),
      OverflowPolicy::DropOldest => {
        // A validated drop policy always has a buffer of at least one slot.
        if st.buffer.pop_front().is_some() {
          st.dropped += 1;
          tracing::trace!(dropped = st.dropped, "overflow: evicted oldest buffered value");
        }
        st.buffer.push_back(item);
        st.wake_watchers(wakeups);
        Ok(())
      }
      OverflowPolicy::DropLatest => {
        st.dropped += 1;
        tracing::trace!(dropped = st.dropped, "overflow: discarded incoming value");
        drop(item);
        Ok(())
      }
    }
  }

  /// Takes the next value without suspending, refilling the freed slot from
  /// the oldest waiting sender.
  fn take(&self, st: &mut ChannelState<T>, wakeups: &mut Wakeups) -> Option<T> {
    if let Some(item) = st.reclaimed.pop_front() {
      return Some(item);
    }

    if let Some(item) = st.buffer.pop_front() {
      if let Some(sender) = st.pending_senders.pop_front() {
        st.buffer.push_back(sender.item);
        st.sent += 1;
        st.send_outcomes.insert(sender.id, SendOutcome::Sent);
        wakeups.push(sender.notify);
      }
      st.wake_watchers(wakeups);
      return Some(item);
    }

    // Unbuffered path: take straight from a waiting sender.
    if let Some(sender) = st.pending_senders.pop_front() {
      st.sent += 1;
      st.send_outcomes.insert(sender.id, SendOutcome::Sent);
      wakeups.push(sender.notify);
      st.wake_watchers(wakeups);
      return Some(sender.item);
    }

    None
  }

  /// Marks the channel closed. Waiting senders get their values back;
  /// waiting receivers resume with "closed" once the channel is drained.
  fn close_locked(&self, st: &mut ChannelState<T>, wakeups: &mut Wakeups) -> bool {
    if st.closed {
      return false;
    }
    st.closed = true;

    // Receivers keep waiting while a value handed to another receiver may
    // still come back.
    st.settle_if_drained(wakeups);
    for sender in st.pending_senders.drain(..) {
      st.send_outcomes.insert(sender.id, SendOutcome::Rejected(sender.item));
      wakeups.push(sender.notify);
    }
    st.wake_watchers(wakeups);
    true
  }

  // --- Send side ---

  pub(crate) fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    let mut wakeups = Wakeups::new();
    let result = {
      let mut st = self.state.lock();
      if st.closed {
        Err(TrySendError::Closed(item))
      } else {
        match self.offer(&mut st, item, &mut wakeups) {
          Ok(()) => {
            st.sent += 1;
            Ok(())
          }
          Err(item) => Err(TrySendError::Full(item)),
        }
      }
    };
    wakeups.fire();
    result
  }

  /// Sends `item`, registering `notify` in the waiting queue if it cannot be
  /// accepted right away.
  pub(crate) fn start_send(&self, item: T, notify: Notify) -> SendAttempt<T> {
    let mut wakeups = Wakeups::new();
    let attempt = {
      let mut st = self.state.lock();
      if st.closed {
        SendAttempt::Closed(item)
      } else {
        match self.offer(&mut st, item, &mut wakeups) {
          Ok(()) => {
            st.sent += 1;
            SendAttempt::Done
          }
          Err(item) => {
            let id = st.next_id();
            st.pending_senders.push_back(PendingSend { id, item, notify });
            // A receiving select may now complete against this sender.
            st.wake_watchers(&mut wakeups);
            SendAttempt::Waiting(id)
          }
        }
      }
    };
    wakeups.fire();
    attempt
  }

  /// Collects the outcome of a suspended send, or refreshes its notifier.
  pub(crate) fn poll_send(&self, id: WaiterId, notify: Notify) -> Option<SendOutcome<T>> {
    let mut st = self.state.lock();
    if let Some(outcome) = st.send_outcomes.remove(&id) {
      return Some(outcome);
    }
    let entry = st.pending_senders.iter_mut().find(|s| s.id == id);
    debug_assert!(entry.is_some(), "send waiter {id} is neither queued nor served");
    if let Some(entry) = entry {
      if !entry.notify.will_wake(&notify) {
        entry.notify = notify;
      }
    }
    None
  }

  /// Withdraws a suspended send. If it was still queued its value is handed
  /// back and was never delivered.
  pub(crate) fn cancel_send(&self, id: WaiterId) -> SendCancel<T> {
    let mut st = self.state.lock();
    if let Some(pos) = st.pending_senders.iter().position(|s| s.id == id) {
      if let Some(sender) = st.pending_senders.remove(pos) {
        tracing::trace!(waiter = id, "withdrew suspended send");
        return SendCancel::Withdrawn(sender.item);
      }
    }
    match st.send_outcomes.remove(&id) {
      Some(outcome) => SendCancel::Finished(outcome),
      // Not registered: nothing to undo.
      None => SendCancel::Finished(SendOutcome::Sent),
    }
  }

  // --- Receive side ---

  pub(crate) fn try_recv(&self) -> Result<T, TryRecvError> {
    let mut wakeups = Wakeups::new();
    let result = {
      let mut st = self.state.lock();
      match self.take(&mut st, &mut wakeups) {
        Some(item) => {
          st.received += 1;
          Ok(item)
        }
        None if st.drained() => Err(TryRecvError::Closed),
        None => Err(TryRecvError::Empty),
      }
    };
    wakeups.fire();
    result
  }

  /// Receives a value, registering `notify` in the waiting queue if none is
  /// available and the channel is still open.
  pub(crate) fn start_recv(&self, notify: Notify) -> RecvAttempt<T> {
    let mut wakeups = Wakeups::new();
    let attempt = {
      let mut st = self.state.lock();
      match self.take(&mut st, &mut wakeups) {
        Some(item) => {
          st.received += 1;
          RecvAttempt::Value(item)
        }
        None if st.drained() => RecvAttempt::Closed,
        None => {
          let id = st.next_id();
          st.pending_receivers.push_back(PendingRecv { id, notify });
          // A sending select may now hand its value to this receiver.
          st.wake_watchers(&mut wakeups);
          RecvAttempt::Waiting(id)
        }
      }
    };
    wakeups.fire();
    attempt
  }

  /// Collects the outcome of a suspended receive, or refreshes its notifier.
  pub(crate) fn poll_recv(&self, id: WaiterId, notify: Notify) -> Option<RecvOutcome<T>> {
    let mut wakeups = Wakeups::new();
    let mut st = self.state.lock();
    if let Some(outcome) = st.collect_recv(id) {
      if matches!(outcome, RecvOutcome::Value(_)) {
        st.received += 1;
        st.settle_if_drained(&mut wakeups);
      }
      drop(st);
      wakeups.fire();
      return Some(outcome);
    }
    let entry = st.pending_receivers.iter_mut().find(|r| r.id == id);
    debug_assert!(entry.is_some(), "receive waiter {id} is neither queued nor served");
    if let Some(entry) = entry {
      if !entry.notify.will_wake(&notify) {
        entry.notify = notify;
      }
    }
    None
  }

  /// Removes a suspended receive from the queue, or takes its outcome if it
  /// was already served.
  fn withdraw_recv(st: &mut ChannelState<T>, id: WaiterId) -> Option<RecvOutcome<T>> {
    if let Some(pos) = st.pending_receivers.iter().position(|r| r.id == id) {
      st.pending_receivers.remove(pos);
      tracing::trace!(waiter = id, "withdrew suspended receive");
      return None;
    }
    st.collect_recv(id)
  }

  /// Withdraws a suspended receive whose caller stops waiting but still wants
  /// a value that was handed to it in the meantime.
  pub(crate) fn cancel_recv(&self, id: WaiterId) -> Option<RecvOutcome<T>> {
    let mut wakeups = Wakeups::new();
    let outcome = {
      let mut st = self.state.lock();
      let outcome = Self::withdraw_recv(&mut st, id);
      if matches!(outcome, Some(RecvOutcome::Value(_))) {
        st.received += 1;
        st.settle_if_drained(&mut wakeups);
      }
      outcome
    };
    wakeups.fire();
    outcome
  }

  /// Withdraws a suspended receive whose caller went away. A value already
  /// handed to it goes back to the channel: to the oldest waiting receiver,
  /// or ahead of the buffer for the next `recv`.
  pub(crate) fn cancel_recv_and_reclaim(&self, id: WaiterId) {
    let mut wakeups = Wakeups::new();
    let orphaned = {
      let mut st = self.state.lock();
      match Self::withdraw_recv(&mut st, id) {
        Some(RecvOutcome::Value(item)) if st.receiver_count > 0 => {
          tracing::trace!(waiter = id, "reclaimed value from a cancelled receive");
          if let Err(item) = st.hand_off(item, &mut wakeups) {
            st.reclaimed.push_back(item);
            st.wake_watchers(&mut wakeups);
          }
          None
        }
        Some(RecvOutcome::Value(item)) => Some(item),
        _ => None,
      }
    };
    wakeups.fire();
    // Nobody is left to receive it; dropped outside the lock.
    drop(orphaned);
  }

  // --- Lifecycle ---

  /// Closes the channel for sending. Returns `true` for the call that
  /// performed the transition.
  pub(crate) fn close(&self) -> bool {
    let mut wakeups = Wakeups::new();
    let transitioned = {
      let mut st = self.state.lock();
      self.close_locked(&mut st, &mut wakeups)
    };
    if transitioned {
      tracing::debug!(woken = wakeups.len(), "channel closed");
    }
    wakeups.fire();
    transitioned
  }

  pub(crate) fn add_sender(&self) {
    self.state.lock().sender_count += 1;
  }

  pub(crate) fn add_receiver(&self) {
    self.state.lock().receiver_count += 1;
  }

  /// Drops one sender handle; the last one closes the channel.
  pub(crate) fn remove_sender(&self) {
    let mut wakeups = Wakeups::new();
    {
      let mut st = self.state.lock();
      st.sender_count -= 1;
      if st.sender_count == 0 && self.close_locked(&mut st, &mut wakeups) {
        tracing::debug!("last sender dropped, channel closed");
      }
    }
    wakeups.fire();
  }

  /// Drops one receiver handle; the last one closes the channel for sending
  /// and discards whatever is still buffered.
  pub(crate) fn remove_receiver(&self) {
    let mut wakeups = Wakeups::new();
    let orphaned = {
      let mut st = self.state.lock();
      st.receiver_count -= 1;
      if st.receiver_count > 0 {
        None
      } else {
        if self.close_locked(&mut st, &mut wakeups) {
          tracing::debug!("last receiver dropped, channel closed");
        }
        Some((std::mem::take(&mut st.buffer), std::mem::take(&mut st.reclaimed)))
      }
    };
    wakeups.fire();
    // Values are dropped outside the lock.
    drop(orphaned);
  }

  // --- Select support ---

  /// Registers `waker` to be woken on the next state change, unless the
  /// clause described by `interest` could already make progress.
  ///
  /// Returns `true` if it is ready now (nothing was registered).
  pub(crate) fn watch(&self, interest: Interest, token: WatchToken, waker: &Waker) -> bool {
    let mut st = self.state.lock();
    let ready = match interest {
      Interest::Recv => {
        st.drained() || !st.reclaimed.is_empty() || !st.buffer.is_empty() || !st.pending_senders.is_empty()
      }
      Interest::Send => {
        st.closed
          || !st.pending_receivers.is_empty()
          || st.buffer.len() < self.capacity
          || self.overflow.drops()
      }
    };
    if !ready {
      match st.watchers.iter_mut().find(|(t, _)| *t == token) {
        Some((_, registered)) => {
          if !registered.will_wake(waker) {
            *registered = waker.clone();
          }
        }
        None => st.watchers.push((token, waker.clone())),
      }
    }
    ready
  }

  /// Forgets the registration of a select that completed or went away.
  pub(crate) fn unwatch(&self, token: WatchToken) {
    self.state.lock().watchers.retain(|(t, _)| *t != token);
  }

  #[cfg(test)]
  pub(crate) fn watcher_count(&self) -> usize {
    self.state.lock().watchers.len()
  }

  // --- Introspection ---

  pub(crate) fn len(&self) -> usize {
    self.state.lock().buffer.len()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  pub(crate) fn stats(&self) -> ChannelStats {
    let st = self.state.lock();
    ChannelStats {
      sent: st.sent,
      received: st.received,
      dropped: st.dropped,
      buffered: st.buffer.len(),
      waiting_senders: st.pending_senders.len(),
      waiting_receivers: st.pending_receivers.len(),
    }
  }

  pub(crate) fn is_full(&self) -> bool {
    self.capacity != usize::MAX && self.len() >= self.capacity
  }
}
