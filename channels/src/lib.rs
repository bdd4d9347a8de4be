//! Conveyor: multi-producer, multi-consumer channels with sync and async APIs.
//!
//! A channel is a FIFO conduit between concurrent producers and consumers.
//! Its behavior is fixed at construction by a [`ChannelConfig`]:
//!
//! - a [`Capacity`]: rendezvous (no buffer, sender and receiver meet), bounded,
//!   or unlimited;
//! - an [`OverflowPolicy`] for a full buffer: suspend the sender, evict the
//!   oldest buffered value, or discard the new one.
//!
//! Every channel hands out both blocking ([`Sender`]/[`Receiver`]) and async
//! ([`AsyncSender`]/[`AsyncReceiver`]) handles, which convert freely into each
//! other. On top of the channel core the crate offers a biased [`Select`] over
//! several channel operations and, with the `tokio` feature, [`produce`] for
//! spawning a producer task that owns its channel.
//!
//! ```
//! # futures_executor::block_on(async {
//! let (tx, rx) = conveyor::bounded_async::<&str>(4);
//! tx.send("ping").await.unwrap();
//! tx.close();
//! assert_eq!(rx.recv().await, Ok("ping"));
//! assert!(rx.recv().await.is_err());
//! # });
//! ```

pub mod config;
pub mod error;
pub mod mpmc;
#[cfg(feature = "tokio")]
pub mod produce;
pub mod select;

// Internal utilities - not part of public API
mod internal;

pub use config::{Capacity, ChannelConfig, OverflowPolicy, DEFAULT_BUFFER_CAPACITY};
pub use error::{
  ConfigError, RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
pub use mpmc::{
  bounded, bounded_async, buffered_async, conflated_async, rendezvous, rendezvous_async, unbounded,
  unbounded_async, with_config, with_config_sync, AsyncReceiver, AsyncSender, ChannelStats, Receiver,
  RecvFuture, SendFuture, Sender,
};
#[cfg(feature = "tokio")]
pub use produce::produce;
pub use select::Select;
