//! Fan-out, fan-in, a two-stage pipeline and a select, end to end.
//!
//! Run with `RUST_LOG=conveyor=trace cargo run --example pipeline` to see the
//! channel events.

use std::time::Duration;

use conveyor::{mpmc, produce, Capacity, ChannelConfig, Select};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  fan_out().await;
  fan_in().await;
  pipeline().await;
  select().await;
}

/// One producer, three consumers taking turns.
async fn fan_out() {
  println!("--- fan-out ---");
  let (numbers, _producer) = produce(Capacity::Rendezvous, |tx| async move {
    for i in 0..9u32 {
      tokio::time::sleep(Duration::from_millis(20)).await;
      println!("#{i} sent");
      if tx.send(i).await.is_err() {
        break;
      }
    }
  })
  .expect("rendezvous config is valid");

  let mut workers = Vec::new();
  for id in 0..3 {
    let numbers = numbers.clone();
    workers.push(tokio::spawn(async move {
      while let Ok(msg) = numbers.recv().await {
        println!("worker #{id} received {msg}");
      }
    }));
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  drop(numbers);

  for worker in workers {
    let _ = worker.await;
  }
}

/// Two producers at different paces, one consumer.
async fn fan_in() {
  println!("--- fan-in ---");
  let (tx, rx) = mpmc::rendezvous_async::<&'static str>();

  for (text, pace) in [("foo", 20), ("BAR!", 50)] {
    let tx = tx.clone();
    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_millis(pace)).await;
        if tx.send(text).await.is_err() {
          break;
        }
      }
    });
  }
  drop(tx);

  for _ in 0..6 {
    if let Ok(text) = rx.recv().await {
      println!("{text}");
    }
  }
  // Dropping the only receiver closes the channel and stops both producers.
}

/// numbers -> squares, with a small buffer between the stages.
async fn pipeline() {
  println!("--- pipeline ---");
  let (numbers, _) = produce(ChannelConfig::bounded(2), |tx| async move {
    for i in 1..=5u64 {
      if tx.send(i).await.is_err() {
        break;
      }
    }
  })
  .expect("bounded config is valid");

  let (squares, _) = produce(ChannelConfig::bounded(2), move |tx| async move {
    let mut numbers = numbers;
    while let Some(n) = numbers.next().await {
      if tx.send(n * n).await.is_err() {
        break;
      }
    }
  })
  .expect("bounded config is valid");

  let squares: Vec<u64> = squares.collect().await;
  println!("squares: {squares:?}");
}

/// Whichever of two producers is ready first.
async fn select() {
  println!("--- select ---");
  let (fizz_tx, fizz) = mpmc::rendezvous_async::<&'static str>();
  let (buzz_tx, buzz) = mpmc::rendezvous_async::<&'static str>();

  tokio::spawn(async move {
    loop {
      tokio::time::sleep(Duration::from_millis(30)).await;
      if fizz_tx.send("Fizz").await.is_err() {
        break;
      }
    }
  });
  tokio::spawn(async move {
    loop {
      tokio::time::sleep(Duration::from_millis(50)).await;
      if buzz_tx.send("Buzz!").await.is_err() {
        break;
      }
    }
  });

  for _ in 0..7 {
    let picked = Select::new()
      .recv(&fizz, |r| format!("fizz -> {}", r.unwrap_or("closed")))
      .recv(&buzz, |r| format!("buzz -> {}", r.unwrap_or("closed")))
      .await;
    println!("{picked}");
  }
}
