//! # In-memory state of one subscription.
//!
//! The whole state lives in a single [`SubscriptionState`] value inside a
//! `tokio::sync::watch` channel owned by the engine. Every writer goes through
//! `send_modify` / `send_if_modified`, so readers always see a consistent
//! snapshot and can await transitions with `wait_for`.

/// Lifecycle phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubscriptionPhase {
    #[default]
    Stopped,
    /// Loading the checkpoint and opening the first subscription.
    Starting,
    Running,
    /// Backend subscription lost; recovery pending.
    Dropped,
    /// A resubscribe attempt is in flight or waiting to retry.
    Resubscribing,
}

/// Snapshot of a subscription's in-memory state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionState {
    pub phase: SubscriptionPhase,
    /// Set by `start()`, cleared by `stop()`.
    pub running: bool,
    /// Set by a drop, cleared by a successful resubscribe.
    pub dropped: bool,
    /// Position of the last delivered (ordered) or acknowledged (queue) event.
    pub last_processed_position: Option<u64>,
    /// Latest gap reported by the gap measurer.
    pub current_gap: Option<u64>,
    /// Session number of the current backend subscription.
    pub session: u64,
    /// Run number, bumped by every `start()`. Recovery loops of an earlier
    /// run compare it and exit.
    pub epoch: u64,
    /// Number of accepted drops; lets the resubscribe loop notice a drop that
    /// arrived while it was subscribing.
    pub drops: u64,
}

impl SubscriptionState {
    /// Running but without a live backend subscription.
    pub fn is_degraded(&self) -> bool {
        self.running && self.dropped
    }

    /// Still inside run `epoch`, i.e. no `stop()` or restart since.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }
}
