//! # Latest measured gap per subscription.
//!
//! ```text
//! gap measurer ──► Bus(GapMeasured) ──► ObserverSet ──► GapTracker::update()
//!                                                          │
//!                                                          ▼
//!                                         HashMap<subscription, {last_seq, gap}>
//! ```
//!
//! ## Rules
//! - Only `GapMeasured` changes the recorded gap.
//! - `SubscriptionStopped` forgets the subscription.
//! - Events with `seq <= last_seq` for a subscription are rejected (stale).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::observers::Observe;

#[derive(Debug, Clone, Copy)]
struct GapState {
    last_seq: u64,
    gap: Option<u64>,
}

/// Observer keeping the most recent gap of every subscription.
///
/// Reads are eventually consistent with the engines publishing the events.
#[derive(Debug, Default)]
pub struct GapTracker {
    state: RwLock<HashMap<String, GapState>>,
}

impl GapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `ev` if it is newer than the last one seen for its subscription.
    ///
    /// Returns `true` when the recorded gap changed.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(name) = ev.subscription.as_deref() else {
            return false;
        };

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(GapState {
            last_seq: 0,
            gap: None,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;

        match ev.kind {
            EventKind::GapMeasured => {
                let changed = entry.gap != ev.gap;
                entry.gap = ev.gap;
                changed
            }
            EventKind::SubscriptionStopped => {
                state.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Latest gap of `subscription`, if one was measured.
    pub async fn gap(&self, subscription: &str) -> Option<u64> {
        self.state
            .read()
            .await
            .get(subscription)
            .and_then(|s| s.gap)
    }

    /// Sorted `(subscription, gap)` pairs for every measured subscription.
    pub async fn snapshot(&self) -> Vec<(String, u64)> {
        let state = self.state.read().await;
        let mut gaps: Vec<(String, u64)> = state
            .iter()
            .filter_map(|(name, s)| s.gap.map(|g| (name.clone(), g)))
            .collect();
        gaps.sort_unstable();
        gaps
    }
}

#[async_trait]
impl Observe for GapTracker {
    async fn on_event(&self, event: &Event) {
        self.update(event).await;
    }

    fn name(&self) -> &'static str {
        "gap-tracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(name: &str, gap: u64) -> Event {
        Event::new(EventKind::GapMeasured)
            .with_subscription(name)
            .with_gap(gap)
    }

    #[tokio::test]
    async fn keeps_latest_gap_per_subscription() {
        let tracker = GapTracker::new();
        assert!(tracker.update(&measured("orders", 5)).await);
        assert!(tracker.update(&measured("billing", 1)).await);
        assert!(tracker.update(&measured("orders", 2)).await);
        assert!(!tracker.update(&measured("orders", 2)).await);

        assert_eq!(tracker.gap("orders").await, Some(2));
        assert_eq!(
            tracker.snapshot().await,
            vec![("billing".to_string(), 1), ("orders".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn stale_events_are_rejected() {
        let tracker = GapTracker::new();
        let older = measured("orders", 9);
        let newer = measured("orders", 3);

        assert!(tracker.update(&newer).await);
        assert!(!tracker.update(&older).await);
        assert_eq!(tracker.gap("orders").await, Some(3));
    }

    #[tokio::test]
    async fn stop_forgets_subscription() {
        let tracker = GapTracker::new();
        tracker.update(&measured("orders", 4)).await;
        tracker
            .update(&Event::new(EventKind::SubscriptionStopped).with_subscription("orders"))
            .await;
        assert_eq!(tracker.gap("orders").await, None);
        assert!(tracker.snapshot().await.is_empty());
    }
}
