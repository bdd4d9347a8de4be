use std::thread;
use std::time::Instant;

const SPIN_ROUNDS: usize = 10;
const YIELD_ROUNDS: usize = 20;

/// Emits a CPU instruction that signals the processor that it is in a spin loop.
#[inline(always)]
fn spin_hint() {
  std::hint::spin_loop();
}

/// Spins, then yields. Returns `true` as soon as `cond` holds.
fn spin_then_yield<F>(cond: &F) -> bool
where
  F: Fn() -> bool,
{
  for _ in 0..SPIN_ROUNDS {
    if cond() {
      return true;
    }
    spin_hint();
  }
  for _ in 0..YIELD_ROUNDS {
    if cond() {
      return true;
    }
    thread::yield_now();
  }
  false
}

/// An adaptive wait strategy that starts with spinning, then yields, then parks.
pub(crate) fn adaptive_wait<F>(cond: F)
where
  F: Fn() -> bool,
{
  if spin_then_yield(&cond) {
    return;
  }
  // Only an `unpark()` from the notifier ends this; spurious wakeups re-check.
  while !cond() {
    thread::park();
  }
}

/// Like [`adaptive_wait`], but gives up at `deadline`.
///
/// Returns `true` if `cond` became true, `false` on timeout.
pub(crate) fn adaptive_wait_until<F>(cond: F, deadline: Instant) -> bool
where
  F: Fn() -> bool,
{
  if spin_then_yield(&cond) {
    return true;
  }
  loop {
    if cond() {
      return true;
    }
    let now = Instant::now();
    if now >= deadline {
      return cond();
    }
    thread::park_timeout(deadline - now);
  }
}
