#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::task::noop_waker;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(50);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const STRESS_TIMEOUT: Duration = Duration::from_secs(15);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_MEDIUM: usize = 200;
pub const ITEMS_HIGH: usize = 1000;

/// Polls `fut` once with a waker that does nothing. Suspension points can be
/// asserted exactly without a runtime.
pub fn poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
  let waker = noop_waker();
  let mut cx = Context::from_waker(&waker);
  Pin::new(fut).poll(&mut cx)
}

/// Installs a test subscriber once; set `RUST_LOG=conveyor=trace` to see
/// channel events.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}
