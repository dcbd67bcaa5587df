//! # Checkpoint failure policy.
//!
//! After every handled event the engine writes a checkpoint. When that write
//! fails, [`CheckpointPolicy`] decides what happens next:
//!
//! ```text
//! store_checkpoint() ─► Err
//!     ├─ Propagate            → return the error to the backend adapter (it may nack / drop)
//!     ├─ Retry { attempts }   → retry locally with backoff, then Propagate
//!     └─ Resubscribe          → treat as a drop: resubscribe from the last seen position
//! ```
//!
//! Handlers already ran for the event, so every variant keeps the
//! at-least-once guarantee; they differ only in who owns the recovery.

use crate::policies::BackoffPolicy;

/// Reaction to a checkpoint-store failure in the delivery path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CheckpointPolicy {
    /// Return the error to the adapter's `deliver` call (default).
    #[default]
    Propagate,
    /// Retry the write up to `attempts` more times, pausing per `backoff`.
    Retry {
        /// Additional attempts after the first failure.
        attempts: u32,
        /// Pause between attempts.
        backoff: BackoffPolicy,
    },
    /// Signal a drop and let the resubscribe loop recover.
    Resubscribe,
}

impl CheckpointPolicy {
    /// Number of extra write attempts this policy allows.
    pub fn extra_attempts(&self) -> u32 {
        match self {
            CheckpointPolicy::Retry { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_retry_grants_extra_attempts() {
        assert_eq!(CheckpointPolicy::Propagate.extra_attempts(), 0);
        assert_eq!(CheckpointPolicy::Resubscribe.extra_attempts(), 0);
        let retry = CheckpointPolicy::Retry {
            attempts: 3,
            backoff: BackoffPolicy::constant(Duration::from_millis(50)),
        };
        assert_eq!(retry.extra_attempts(), 3);
    }
}
