//! # Background gap measurement.
//!
//! While an engine runs with a gap interval configured, one task per engine
//! periodically asks the backend for its head position and publishes
//! `head − last_processed` as a `GapMeasured` event.
//!
//! ```text
//! loop (every interval, until cancelled):
//!     head = subscriber.head_position()
//!     if head and last_processed are known:
//!         gap = head - last_processed   (0 when the head is behind)
//!         state.current_gap = gap; publish GapMeasured
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::state::SubscriptionState;
use crate::error::SubscribeError;
use crate::events::{Bus, Event, EventKind};
use crate::source::Subscriber;

/// Distance from `last` to `head`.
///
/// A head behind the last processed position (e.g. a backend reporting a
/// stale head) counts as no gap.
pub(crate) fn gap_between(head: u64, last: u64) -> u64 {
    head.saturating_sub(last)
}

pub(crate) struct GapMeasurer {
    pub(crate) name: Arc<str>,
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) state: Arc<watch::Sender<SubscriptionState>>,
    pub(crate) bus: Bus,
    pub(crate) interval: Duration,
}

/// Running measurement task.
pub(crate) struct GapTask {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl GapTask {
    /// Cancels the task and waits for it; cancellation is the expected outcome.
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        match self.join.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!(error = %e, "gap measurement task panicked"),
        }
    }
}

impl GapMeasurer {
    pub(crate) fn spawn(self) -> GapTask {
        let token = CancellationToken::new();
        let join = tokio::spawn(self.run(token.clone()));
        GapTask { token, join }
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let head = tokio::select! {
                _ = token.cancelled() => break,
                head = self.subscriber.head_position() => head,
            };
            self.record(head);
        }
        tracing::debug!(subscription = %self.name, "gap measurement stopped");
    }

    fn record(&self, head: Result<Option<u64>, SubscribeError>) -> Option<u64> {
        let head = match head {
            Ok(Some(head)) => head,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(subscription = %self.name, error = %e, "failed to read head position");
                return None;
            }
        };
        let last = self.state.borrow().last_processed_position?;
        let gap = gap_between(head, last);

        self.state.send_modify(|s| s.current_gap = Some(gap));
        tracing::debug!(subscription = %self.name, head, last, gap, "measured gap");
        self.bus.publish(
            Event::new(EventKind::GapMeasured)
                .with_subscription(Arc::clone(&self.name))
                .with_gap(gap)
                .with_position(Some(head)),
        );
        Some(gap)
    }
}
