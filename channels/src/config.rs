//! Channel shape: how many values it buffers and what happens when it is full.

use crate::error::ConfigError;

/// Buffer size used by [`Capacity::buffered`].
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// How many values a channel can hold before its overflow policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Capacity {
  /// No buffer. A `send` completes only once a receiver has taken the value.
  #[default]
  Rendezvous,
  /// Up to `n` values are buffered.
  Bounded(usize),
  /// Sends never wait. Bounded only by available memory.
  Unlimited,
}

impl Capacity {
  /// A bounded buffer of [`DEFAULT_BUFFER_CAPACITY`] values.
  pub const fn buffered() -> Self {
    Capacity::Bounded(DEFAULT_BUFFER_CAPACITY)
  }

  /// `Bounded(0)` is a rendezvous channel.
  pub(crate) fn normalized(self) -> Self {
    match self {
      Capacity::Bounded(0) => Capacity::Rendezvous,
      other => other,
    }
  }

  /// The buffer limit as a plain number, `usize::MAX` standing for unlimited.
  pub(crate) fn limit(self) -> usize {
    match self.normalized() {
      Capacity::Rendezvous => 0,
      Capacity::Bounded(n) => n,
      Capacity::Unlimited => usize::MAX,
    }
  }

  pub(crate) fn from_limit(limit: usize) -> Self {
    match limit {
      0 => Capacity::Rendezvous,
      usize::MAX => Capacity::Unlimited,
      n => Capacity::Bounded(n),
    }
  }
}

impl From<usize> for Capacity {
  fn from(n: usize) -> Self {
    Capacity::from_limit(n)
  }
}

/// What a `send` does when the buffer is full and no receiver is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverflowPolicy {
  /// The sender waits for room.
  #[default]
  Suspend,
  /// The oldest buffered value is evicted to make room for the new one.
  DropOldest,
  /// The new value is discarded.
  DropLatest,
}

impl OverflowPolicy {
  pub(crate) fn drops(self) -> bool {
    !matches!(self, OverflowPolicy::Suspend)
  }
}

/// Full description of a channel, fixed for its lifetime.
///
/// ```
/// use conveyor::{Capacity, ChannelConfig, OverflowPolicy};
///
/// let config = ChannelConfig::new(Capacity::Bounded(2)).overflow(OverflowPolicy::DropOldest);
/// let (tx, rx) = conveyor::with_config::<u32>(config).unwrap();
/// # drop((tx, rx));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelConfig {
  pub capacity: Capacity,
  pub overflow: OverflowPolicy,
}

impl ChannelConfig {
  pub fn new(capacity: Capacity) -> Self {
    Self {
      capacity,
      overflow: OverflowPolicy::Suspend,
    }
  }

  /// Rendezvous channel, the default shape.
  pub fn rendezvous() -> Self {
    Self::new(Capacity::Rendezvous)
  }

  pub fn bounded(capacity: usize) -> Self {
    Self::new(Capacity::Bounded(capacity))
  }

  pub fn unlimited() -> Self {
    Self::new(Capacity::Unlimited)
  }

  /// One slot that always holds the most recent value.
  pub fn conflated() -> Self {
    Self::new(Capacity::Bounded(1)).overflow(OverflowPolicy::DropOldest)
  }

  /// Bounded channel of [`DEFAULT_BUFFER_CAPACITY`] values.
  pub fn buffered() -> Self {
    Self::new(Capacity::buffered())
  }

  pub fn capacity(mut self, capacity: Capacity) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
    self.overflow = overflow;
    self
  }

  /// Checks the combination and returns the normalised config.
  ///
  /// # Errors
  ///
  /// [`ConfigError::DropPolicyWithoutBuffer`] when a drop policy is paired
  /// with a rendezvous channel (including `Bounded(0)`).
  pub fn validate(self) -> Result<Self, ConfigError> {
    let capacity = self.capacity.normalized();
    if capacity == Capacity::Rendezvous && self.overflow.drops() {
      return Err(ConfigError::DropPolicyWithoutBuffer(self.overflow));
    }
    Ok(Self {
      capacity,
      overflow: self.overflow,
    })
  }
}

impl From<Capacity> for ChannelConfig {
  fn from(capacity: Capacity) -> Self {
    ChannelConfig::new(capacity)
  }
}
