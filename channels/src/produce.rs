// src/produce.rs

//! Producer tasks that own their channel's sending side.

use crate::config::ChannelConfig;
use crate::error::ConfigError;
use crate::mpmc::{with_config, AsyncReceiver, AsyncSender};

use std::future::Future;

use tokio::task::JoinHandle;

/// Spawns `body` on the current Tokio runtime with the only sender of a new
/// channel, and returns the receiving side.
///
/// The channel closes when `body` finishes (its sender is dropped), so
/// consumers see every produced value and then the end of the stream. If all
/// receivers are dropped first, the producer's next send fails with
/// [`SendError`](crate::SendError), which is its cue to stop.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use conveyor::{produce, Capacity};
/// use futures_util::StreamExt;
///
/// let (squares, _task) = produce(Capacity::Bounded(2), |tx| async move {
///   for i in 1..=4u32 {
///     if tx.send(i * i).await.is_err() {
///       break;
///     }
///   }
/// })
/// .unwrap();
///
/// assert_eq!(squares.collect::<Vec<_>>().await, vec![1, 4, 9, 16]);
/// # }
/// ```
///
/// # Errors
///
/// Returns the [`ConfigError`] of an invalid `config`; nothing is spawned then.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
pub fn produce<T, F, Fut>(
  config: impl Into<ChannelConfig>,
  body: F,
) -> Result<(AsyncReceiver<T>, JoinHandle<()>), ConfigError>
where
  T: Send + 'static,
  F: FnOnce(AsyncSender<T>) -> Fut,
  Fut: Future<Output = ()> + Send + 'static,
{
  let (tx, rx) = with_config::<T>(config.into())?;
  let producer = body(tx);
  let handle = tokio::spawn(async move {
    producer.await;
    tracing::debug!("producer finished, closing its channel");
  });
  Ok((rx, handle))
}
