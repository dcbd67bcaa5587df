//! # Backoff policy for resubscribe attempts.
//!
//! [`BackoffPolicy`] controls the pause between failed attempts to re-open a
//! dropped subscription. The delay for retry `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`, then jittered.
//!
//! The default is a **constant** one-second pause: the engine never gives up,
//! so the delay only has to keep a dead backend from being hammered.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use subvisor::{BackoffPolicy, JitterPolicy};
//!
//! let constant = BackoffPolicy::default();
//! assert_eq!(constant.next(0), Duration::from_secs(1));
//! assert_eq!(constant.next(7), Duration::from_secs(1));
//!
//! let growing = BackoffPolicy::exponential(Duration::from_millis(250), Duration::from_secs(4), 2.0);
//! assert_eq!(growing.next(1), Duration::from_millis(500));
//! assert_eq!(growing.next(10), Duration::from_secs(4));
//! assert_eq!(growing.jitter, JitterPolicy::None);
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied on top of the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 1s delay without jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay grows by `factor` per retry up to `max`.
    pub fn exponential(first: Duration, max: Duration, factor: f64) -> Self {
        Self {
            first,
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    /// Returns the policy with a different jitter strategy.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay before retry number `attempt` (0-indexed).
    ///
    /// The base is derived from the attempt number alone, so jitter output
    /// never feeds into later delays.
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            other => other.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_second_constant() {
        let policy = BackoffPolicy::default();
        for attempt in [0, 1, 2, 50, u32::MAX] {
            assert_eq!(policy.next(attempt), Duration::from_secs(1));
        }
    }

    #[test]
    fn exponential_doubles_until_cap() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1), 2.0);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy =
            BackoffPolicy::exponential(Duration::from_secs(10), Duration::from_secs(5), 2.0);
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn overflowing_exponent_clamps_to_max() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(30), 10.0);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_full_base() {
        let policy = BackoffPolicy::constant(Duration::from_millis(1000))
            .with_jitter(JitterPolicy::Equal);
        for attempt in 0..50 {
            let delay = policy.next(attempt);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= Duration::from_millis(1000), "{delay:?}");
        }
    }

    #[test]
    fn decorrelated_jitter_never_drops_below_first() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(30), 2.0)
                .with_jitter(JitterPolicy::Decorrelated);
        for _ in 0..100 {
            let delay = policy.next(6);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(30));
        }
    }
}
