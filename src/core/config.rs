//! # Per-subscription configuration.
//!
//! [`SubscriptionConfig`] holds the settings of one engine instance.
//!
//! ## Sentinel values
//! - `gap_interval = 0s` → gap measurement disabled (no background task)
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::time::Duration;

use crate::policies::{BackoffPolicy, CheckpointPolicy};

/// Configuration of one subscription engine.
///
/// ## Field semantics
/// - `name`: subscription name; also the handler group and checkpoint key
/// - `retry`: pause between failed resubscribe attempts
/// - `disposed_drop_delay`: wait before resubscribing after a local disposal
/// - `gap_interval`: gap measurement period (`0s` = disabled)
/// - `bus_capacity`: lifecycle event ring buffer size
/// - `checkpoint_policy`: reaction to checkpoint write failures
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use subvisor::SubscriptionConfig;
///
/// let cfg = SubscriptionConfig::new("orders").with_gap_measurement(Duration::from_secs(1));
/// assert_eq!(cfg.measure_interval(), Some(Duration::from_secs(1)));
/// assert_eq!(SubscriptionConfig::new("orders").measure_interval(), None);
/// ```
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Unique subscription name.
    pub name: String,

    /// Delay policy between failed resubscribe attempts.
    ///
    /// Retries are unbounded; only the pause between them is configurable.
    pub retry: BackoffPolicy,

    /// Initial wait before recovering from a drop caused by local disposal.
    ///
    /// Such drops usually race a shutdown, so recovery waits for `stop()` to
    /// win first.
    pub disposed_drop_delay: Duration,

    /// Gap measurement period.
    ///
    /// - `Duration::ZERO` = disabled
    /// - `> 0` = measure every `gap_interval` while running
    pub gap_interval: Duration,

    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// What to do when a checkpoint write fails.
    pub checkpoint_policy: CheckpointPolicy,
}

impl SubscriptionConfig {
    /// Default settings for subscription `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: BackoffPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_disposed_drop_delay(mut self, delay: Duration) -> Self {
        self.disposed_drop_delay = delay;
        self
    }

    /// Enables gap measurement every `interval` (`0s` disables it again).
    pub fn with_gap_measurement(mut self, interval: Duration) -> Self {
        self.gap_interval = interval;
        self
    }

    pub fn with_checkpoint_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.checkpoint_policy = policy;
        self
    }

    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Gap measurement period, `None` when disabled.
    #[inline]
    pub fn measure_interval(&self) -> Option<Duration> {
        if self.gap_interval.is_zero() {
            None
        } else {
            Some(self.gap_interval)
        }
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SubscriptionConfig {
    /// Default configuration:
    ///
    /// - `name = "default"`
    /// - `retry = BackoffPolicy::default()` (constant 1s)
    /// - `disposed_drop_delay = 10s`
    /// - `gap_interval = 0s` (disabled)
    /// - `bus_capacity = 1024`
    /// - `checkpoint_policy = CheckpointPolicy::Propagate`
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            retry: BackoffPolicy::default(),
            disposed_drop_delay: Duration::from_secs(10),
            gap_interval: Duration::ZERO,
            bus_capacity: 1024,
            checkpoint_policy: CheckpointPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SubscriptionConfig::new("orders");
        assert_eq!(cfg.name, "orders");
        assert_eq!(cfg.retry.next(0), Duration::from_secs(1));
        assert_eq!(cfg.disposed_drop_delay, Duration::from_secs(10));
        assert_eq!(cfg.measure_interval(), None);
        assert_eq!(cfg.checkpoint_policy, CheckpointPolicy::Propagate);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(
            SubscriptionConfig::new("a")
                .with_bus_capacity(0)
                .bus_capacity_clamped(),
            1
        );
    }

    #[test]
    fn gap_measurement_can_be_disabled_again() {
        let cfg = SubscriptionConfig::new("a")
            .with_gap_measurement(Duration::from_secs(2))
            .with_gap_measurement(Duration::ZERO);
        assert_eq!(cfg.measure_interval(), None);
    }
}
