mod common;
use common::*;

use conveyor::error::{RecvError, SendError, TrySendError};
use conveyor::mpmc;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::task::Poll;

// --- Helper Function for Async MPMC Tests ---
async fn run_async_mpmc_test(
  num_producers: usize,
  num_consumers: usize,
  items_per_producer: usize,
  channel_capacity: usize,
) {
  let (tx, rx) = mpmc::bounded_async(channel_capacity);
  let total_items_expected = num_producers * items_per_producer;
  let received_items_set = Arc::new(tokio::sync::Mutex::new(HashSet::new()));
  let received_count = Arc::new(AtomicUsize::new(0));

  // --- Spawn Receivers ---
  let mut consumer_handles = Vec::new();
  for _ in 0..num_consumers {
    let rx_clone = rx.clone();
    let received_set_clone = Arc::clone(&received_items_set);
    let received_count_clone = Arc::clone(&received_count);

    consumer_handles.push(tokio::spawn(async move {
      while let Ok(item) = rx_clone.recv().await {
        assert!(received_set_clone.lock().await.insert(item), "Duplicate item received!");
        received_count_clone.fetch_add(1, AtomicOrdering::Relaxed);
      }
    }));
  }
  drop(rx);

  // --- Spawn Senders ---
  let mut producer_handles = Vec::new();
  for p_id in 0..num_producers {
    let tx_clone = tx.clone();
    producer_handles.push(tokio::spawn(async move {
      for i in 0..items_per_producer {
        let item = p_id * items_per_producer + i;
        tx_clone.send(item).await.unwrap();
      }
    }));
  }
  drop(tx);

  // --- Join and Assert ---
  for handle in producer_handles {
    handle.await.expect("Sender task panicked");
  }
  for handle in consumer_handles {
    handle.await.expect("Receiver task panicked");
  }

  assert_eq!(received_count.load(AtomicOrdering::Relaxed), total_items_expected);
  let received = received_items_set.lock().await;
  assert_eq!(received.len(), total_items_expected);
  assert!((0..total_items_expected).all(|item| received.contains(&item)));
}

// --- Concurrency ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_1p_1c_basic() {
  run_async_mpmc_test(1, 1, ITEMS_HIGH, 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_mp_1c_basic() {
  run_async_mpmc_test(4, 1, ITEMS_MEDIUM, 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_1p_mc_basic() {
  run_async_mpmc_test(1, 4, ITEMS_HIGH, 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_mp_mc_contention() {
  run_async_mpmc_test(4, 4, ITEMS_HIGH, 4).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_mp_mc_rendezvous() {
  run_async_mpmc_test(3, 3, ITEMS_MEDIUM, 0).await;
}

// --- Ordering ---

#[tokio::test]
async fn single_producer_order_is_fifo() {
  let (tx, rx) = mpmc::unbounded_async();
  for i in 0..ITEMS_HIGH {
    tx.send(i).await.unwrap();
  }
  drop(tx);

  let received: Vec<usize> = rx.collect().await;
  assert_eq!(received, (0..ITEMS_HIGH).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn per_producer_order_survives_fan_in() {
  let (tx, rx) = mpmc::bounded_async::<(usize, usize)>(8);
  let mut producers = Vec::new();
  for p_id in 0..3 {
    let tx = tx.clone();
    producers.push(tokio::spawn(async move {
      for seq in 0..ITEMS_MEDIUM {
        tx.send((p_id, seq)).await.unwrap();
      }
    }));
  }
  drop(tx);

  let mut next_seq = [0usize; 3];
  while let Ok((p_id, seq)) = rx.recv().await {
    assert_eq!(seq, next_seq[p_id], "producer {p_id} out of order");
    next_seq[p_id] += 1;
  }
  assert_eq!(next_seq, [ITEMS_MEDIUM; 3]);
  for producer in producers {
    producer.await.unwrap();
  }
}

#[test]
fn fan_out_follows_waiting_order() {
  let (tx, rx) = mpmc::rendezvous_async::<&str>();
  let (c1, c2, c3) = (rx.clone(), rx.clone(), rx.clone());

  let mut r1 = c1.recv();
  let mut r2 = c2.recv();
  let mut r3 = c3.recv();
  assert!(poll_once(&mut r1).is_pending());
  assert!(poll_once(&mut r2).is_pending());
  assert!(poll_once(&mut r3).is_pending());
  assert_eq!(rx.stats().waiting_receivers, 3);

  // Each value is assigned at send time; checked in reverse to show it.
  for value in ["one", "two", "three"] {
    assert_eq!(poll_once(&mut tx.send(value)), Poll::Ready(Ok(())));
  }

  assert_eq!(poll_once(&mut r3), Poll::Ready(Ok("three")));
  assert_eq!(poll_once(&mut r2), Poll::Ready(Ok("two")));
  assert_eq!(poll_once(&mut r1), Poll::Ready(Ok("one")));
}

// --- Suspension points ---

#[test]
fn rendezvous_send_waits_for_receiver() {
  let (tx, rx) = mpmc::rendezvous_async::<&str>();

  // Receiver first: the send completes on the spot by handing off.
  let mut recv = rx.recv();
  assert!(poll_once(&mut recv).is_pending());
  assert_eq!(poll_once(&mut tx.send("X")), Poll::Ready(Ok(())));
  assert_eq!(poll_once(&mut recv), Poll::Ready(Ok("X")));

  // Sender first: it stays suspended until a receive takes the value.
  let mut send = tx.send("Y");
  assert!(poll_once(&mut send).is_pending());
  assert!(poll_once(&mut send).is_pending());
  assert_eq!(rx.len(), 0);
  assert_eq!(poll_once(&mut rx.recv()), Poll::Ready(Ok("Y")));
  assert_eq!(poll_once(&mut send), Poll::Ready(Ok(())));
}

#[test]
fn bounded_third_send_suspends_until_a_receive() {
  let (tx, rx) = mpmc::bounded_async::<u32>(2);
  assert_eq!(poll_once(&mut tx.send(1)), Poll::Ready(Ok(())));
  assert_eq!(poll_once(&mut tx.send(2)), Poll::Ready(Ok(())));
  assert!(tx.is_full());

  let mut third = tx.send(3);
  assert!(poll_once(&mut third).is_pending());
  assert!(matches!(tx.try_send(4), Err(TrySendError::Full(4))));

  assert_eq!(rx.try_recv(), Ok(1));
  assert_eq!(poll_once(&mut third), Poll::Ready(Ok(())));
  assert_eq!(rx.len(), 2);
  assert_eq!(rx.try_recv(), Ok(2));
  assert_eq!(rx.try_recv(), Ok(3));
}

#[tokio::test]
async fn pipeline_backpressure_throttles_upstream() {
  let (a_tx, a_rx) = mpmc::bounded_async::<u32>(1);
  let (b_tx, b_rx) = mpmc::bounded_async::<u32>(1);

  let stage = tokio::spawn(async move {
    while let Ok(value) = a_rx.recv().await {
      if b_tx.send(value * 10).await.is_err() {
        break;
      }
    }
  });

  // Nobody drains B: one value sits in B, one is held by the stage and one
  // fills A. After that the source cannot make progress.
  for value in 0..3 {
    tokio::time::timeout(LONG_TIMEOUT, a_tx.send(value)).await.unwrap().unwrap();
  }
  assert!(tokio::time::timeout(SHORT_TIMEOUT, a_tx.send(3)).await.is_err());

  drop(a_tx);
  let drained: Vec<u32> = b_rx.collect().await;
  assert_eq!(drained, vec![0, 10, 20]);
  stage.await.unwrap();
}

// --- Close ---

#[tokio::test]
async fn close_drains_then_errors() {
  let (tx, rx) = mpmc::bounded_async::<u32>(4);
  tx.send(1).await.unwrap();
  tx.send(2).await.unwrap();
  assert!(tx.close());
  assert!(!rx.close());

  assert_eq!(tx.send(3).await, Err(SendError(3)));
  assert_eq!(rx.recv().await, Ok(1));
  assert_eq!(rx.recv().await, Ok(2));
  assert_eq!(rx.recv().await, Err(RecvError::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_wakes_suspended_receivers() {
  let (tx, rx) = mpmc::rendezvous_async::<u32>();
  let mut waiting = Vec::new();
  for _ in 0..3 {
    let rx = rx.clone();
    waiting.push(tokio::spawn(async move { rx.recv().await }));
  }
  while tx.stats().waiting_receivers < 3 {
    tokio::task::yield_now().await;
  }

  tx.close();
  for handle in waiting {
    assert_eq!(handle.await.unwrap(), Err(RecvError::Closed));
  }
}

#[test]
fn close_hands_values_back_to_suspended_senders() {
  let (tx, rx) = mpmc::rendezvous_async::<String>();
  let mut send = tx.send("kept".to_string());
  assert!(poll_once(&mut send).is_pending());

  rx.close();
  match poll_once(&mut send) {
    Poll::Ready(Err(err)) => assert_eq!(err.into_inner(), "kept"),
    other => panic!("expected a rejected send, got {other:?}"),
  }
}

#[tokio::test]
async fn dropping_all_senders_ends_the_stream() {
  let (tx, mut rx) = mpmc::unbounded_async::<u32>();
  let tx2 = tx.clone();
  tx.send(1).await.unwrap();
  drop(tx);
  assert!(!rx.is_closed());
  tx2.send(2).await.unwrap();
  drop(tx2);

  assert_eq!(rx.next().await, Some(1));
  assert_eq!(rx.next().await, Some(2));
  assert_eq!(rx.next().await, None);
}

#[tokio::test]
async fn dropping_all_receivers_rejects_sends() {
  let (tx, rx) = mpmc::bounded_async::<u32>(2);
  tx.send(1).await.unwrap();
  drop(rx);
  assert!(tx.is_closed());
  assert_eq!(tx.len(), 0);
  assert_eq!(tx.send(2).await, Err(SendError(2)));
}

// --- Mixed paradigms ---

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_producer_feeds_async_consumer() {
  let (tx, rx) = mpmc::bounded_async::<usize>(4);
  let sync_tx = tx.to_sync();

  let producer = std::thread::spawn(move || {
    for i in 0..ITEMS_MEDIUM {
      sync_tx.send(i).unwrap();
    }
  });

  let received: Vec<usize> = tokio::time::timeout(STRESS_TIMEOUT, rx.collect())
    .await
    .expect("consumer timed out");
  assert_eq!(received, (0..ITEMS_MEDIUM).collect::<Vec<_>>());
  producer.join().unwrap();
}

#[tokio::test]
async fn stats_track_traffic() {
  let (tx, rx) = mpmc::bounded_async::<u32>(4);
  tx.send(1).await.unwrap();
  tx.send(2).await.unwrap();
  rx.recv().await.unwrap();

  let stats = rx.stats();
  assert_eq!(stats.sent, 2);
  assert_eq!(stats.received, 1);
  assert_eq!(stats.buffered, 1);
  assert_eq!(stats.dropped, 0);
  assert_eq!(stats.waiting_senders, 0);
  assert_eq!(stats.waiting_receivers, 0);
}
