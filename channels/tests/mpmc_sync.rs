mod common;
use common::*;

use conveyor::error::{RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError};
use conveyor::mpmc;

use pretty_assertions::assert_eq;

use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// --- Helper Function for Sync MPMC Tests ---
fn run_sync_mpmc_test(num_producers: usize, num_consumers: usize, items_per_producer: usize, capacity: usize) {
  let (tx, rx) = mpmc::bounded(capacity);
  let total = num_producers * items_per_producer;
  let received = Arc::new(Mutex::new(Vec::with_capacity(total)));
  let start = Arc::new(Barrier::new(num_producers + num_consumers));

  let mut consumers = Vec::new();
  for _ in 0..num_consumers {
    let rx = rx.clone();
    let received = Arc::clone(&received);
    let start = Arc::clone(&start);
    consumers.push(thread::spawn(move || {
      start.wait();
      for item in rx.iter() {
        received.lock().unwrap().push(item);
      }
    }));
  }
  drop(rx);

  let mut producers = Vec::new();
  for p_id in 0..num_producers {
    let tx = tx.clone();
    let start = Arc::clone(&start);
    producers.push(thread::spawn(move || {
      start.wait();
      for i in 0..items_per_producer {
        tx.send(p_id * items_per_producer + i).unwrap();
      }
    }));
  }
  drop(tx);

  for handle in producers {
    handle.join().expect("Sender thread panicked");
  }
  for handle in consumers {
    handle.join().expect("Receiver thread panicked");
  }

  let mut received = Arc::try_unwrap(received).unwrap().into_inner().unwrap();
  assert_eq!(received.len(), total, "lost or duplicated items");
  received.sort_unstable();
  assert_eq!(received, (0..total).collect::<Vec<_>>());
}

#[test]
fn sync_1p_1c_basic() {
  run_sync_mpmc_test(1, 1, ITEMS_HIGH, 16);
}

#[test]
fn sync_mp_mc_contention() {
  run_sync_mpmc_test(4, 4, ITEMS_HIGH, 2);
}

#[test]
fn sync_mp_mc_rendezvous() {
  run_sync_mpmc_test(3, 2, ITEMS_MEDIUM, 0);
}

#[test]
fn sync_unbounded_never_blocks() {
  let (tx, rx) = mpmc::unbounded();
  for i in 0..ITEMS_HIGH {
    tx.send(i).unwrap();
  }
  assert_eq!(rx.len(), ITEMS_HIGH);
  assert!(!tx.is_full());
  drop(tx);
  assert_eq!(rx.into_iter().collect::<Vec<_>>(), (0..ITEMS_HIGH).collect::<Vec<_>>());
}

// --- Blocking and timeouts ---

#[test]
fn rendezvous_send_blocks_until_received() {
  let (tx, rx) = mpmc::rendezvous::<&str>();
  let sent = Arc::new(Mutex::new(false));

  let sent_flag = Arc::clone(&sent);
  let sender = thread::spawn(move || {
    tx.send("X").unwrap();
    *sent_flag.lock().unwrap() = true;
  });

  thread::sleep(SHORT_TIMEOUT);
  assert!(!*sent.lock().unwrap(), "send completed without a receiver");
  assert_eq!(rx.recv_timeout(LONG_TIMEOUT), Ok("X"));
  sender.join().unwrap();
  assert!(*sent.lock().unwrap());
}

#[test]
fn recv_timeout_on_empty_channel() {
  let (_tx, rx) = mpmc::bounded::<u32>(1);
  let started = Instant::now();
  assert_eq!(rx.recv_timeout(SHORT_TIMEOUT), Err(RecvTimeoutError::Timeout));
  assert!(started.elapsed() >= SHORT_TIMEOUT);
  // The timed-out receive left nothing behind.
  assert_eq!(rx.stats().waiting_receivers, 0);
}

#[test]
fn send_timeout_returns_the_value() {
  let (tx, rx) = mpmc::bounded::<String>(1);
  tx.send("first".to_string()).unwrap();

  match tx.send_timeout("second".to_string(), SHORT_TIMEOUT) {
    Err(SendTimeoutError::Timeout(value)) => assert_eq!(value, "second"),
    other => panic!("expected a timeout, got {other:?}"),
  }
  assert_eq!(tx.stats().waiting_senders, 0);
  assert_eq!(rx.try_recv(), Ok("first".to_string()));
  assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn blocked_sender_resumes_after_receive() {
  let (tx, rx) = mpmc::bounded::<u32>(2);
  tx.send(1).unwrap();
  tx.send(2).unwrap();

  let sender = thread::spawn(move || tx.send_timeout(3, LONG_TIMEOUT));
  while rx.stats().waiting_senders == 0 {
    thread::sleep(Duration::from_millis(1));
  }
  assert_eq!(rx.recv(), Ok(1));
  assert_eq!(sender.join().unwrap(), Ok(()));
  assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2, 3]);
}

// --- Close ---

#[test]
fn close_drains_then_errors() {
  let (tx, rx) = mpmc::bounded::<u32>(4);
  tx.send(1).unwrap();
  tx.send(2).unwrap();
  assert!(rx.close());
  assert!(!tx.close());

  assert_eq!(tx.send(3), Err(SendError(3)));
  assert_eq!(rx.recv(), Ok(1));
  assert_eq!(rx.recv(), Ok(2));
  assert_eq!(rx.recv(), Err(RecvError::Closed));
  assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
  assert_eq!(rx.recv_timeout(SHORT_TIMEOUT), Err(RecvTimeoutError::Closed));
}

#[test]
fn close_unblocks_waiting_threads() {
  let (tx, rx) = mpmc::rendezvous::<u32>();
  let receivers: Vec<_> = (0..2)
    .map(|_| {
      let rx = rx.clone();
      thread::spawn(move || rx.recv())
    })
    .collect();
  while rx.stats().waiting_receivers < 2 {
    thread::sleep(Duration::from_millis(1));
  }

  tx.close();
  for handle in receivers {
    assert_eq!(handle.join().unwrap(), Err(RecvError::Closed));
  }
}

#[test]
fn iterator_ends_when_senders_drop() {
  let (tx, rx) = mpmc::bounded::<u32>(2);
  let producer = thread::spawn(move || {
    for i in 0..ITEMS_LOW as u32 {
      tx.send(i).unwrap();
    }
  });

  let mut seen = HashSet::new();
  for item in &rx {
    assert!(seen.insert(item));
  }
  producer.join().unwrap();
  assert_eq!(seen.len(), ITEMS_LOW);
}

// --- Conversions ---

#[test]
fn handles_convert_between_paradigms() {
  let (tx, rx) = mpmc::bounded::<u32>(2);
  let async_tx = tx.clone().to_async();
  let async_rx = rx.clone().to_async();

  async_tx.try_send(1).unwrap();
  tx.send(2).unwrap();
  assert_eq!(rx.recv(), Ok(1));
  assert_eq!(async_rx.try_recv(), Ok(2));

  // Conversion neither closes nor reopens the channel.
  let back = async_tx.to_sync();
  drop(tx);
  assert!(!rx.is_closed());
  drop(back);
  assert!(rx.is_closed());
}
