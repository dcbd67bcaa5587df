//! # Drop handling and the resubscribe loop.
//!
//! ```text
//! sink.dropped(reason) ─► on_dropped
//!    ├─ not running / stale session ─► ignore
//!    ├─ already dropped ─────────────► count it (the running loop will notice)
//!    └─ dropped = true, spawn resubscribe(initial_delay)
//!
//! resubscribe(initial_delay):
//!    sleep(initial_delay)            (disposed_drop_delay for local disposal, else 0)
//!    while the run that dropped is current && dropped:
//!       dispose stale handle, subscribe(last_processed_position) under a new session
//!       ├─ Ok  → dropped = false (unless another drop arrived meanwhile), Running
//!       └─ Err → log, sleep(retry.next(attempt))
//! ```
//!
//! Retries are unbounded; only `stop()` ends the loop. Each loop belongs to
//! one run (`epoch`), so a loop outliving a `stop(); start()` exits instead of
//! competing with the new run's recovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::checkpoint::Checkpoint;
use crate::core::engine::Inner;
use crate::core::state::{SubscriptionPhase, SubscriptionState};
use crate::events::{Event, EventKind};
use crate::source::DropReason;

impl<E> Inner<E>
where
    E: Send + Sync + 'static,
{
    pub(crate) fn on_dropped(
        self: &Arc<Self>,
        session: u64,
        reason: DropReason,
        error: Option<String>,
    ) {
        let mut first = false;
        let mut epoch = 0;
        let accepted = self.state.send_if_modified(|s| {
            if !s.running || s.session != session {
                return false;
            }
            first = !s.dropped;
            epoch = s.epoch;
            s.dropped = true;
            s.drops += 1;
            s.phase = SubscriptionPhase::Dropped;
            true
        });
        if !accepted {
            tracing::debug!(
                subscription = %self.name,
                session,
                reason = %reason,
                "ignoring drop of inactive subscription"
            );
            return;
        }

        tracing::warn!(
            subscription = %self.name,
            reason = %reason,
            error = error.as_deref().unwrap_or("none"),
            "subscription dropped"
        );
        let detail = match &error {
            Some(e) => format!("{reason}: {e}"),
            None => reason.to_string(),
        };
        self.bus.publish(
            Event::new(EventKind::SubscriptionDropped)
                .with_subscription(Arc::clone(&self.name))
                .with_reason(detail),
        );

        if !first {
            return;
        }
        let delay = if reason.is_local_disposal() {
            self.cfg.disposed_drop_delay
        } else {
            Duration::ZERO
        };
        let me = Arc::clone(self);
        tokio::spawn(async move { me.resubscribe(epoch, delay).await });
    }

    /// Recovers run `epoch`; exits as soon as that run is stopped or replaced.
    async fn resubscribe(self: Arc<Self>, epoch: u64, initial_delay: Duration) {
        let mut stopped = self.state.subscribe();

        if !initial_delay.is_zero() {
            tracing::info!(
                subscription = %self.name,
                delay_ms = initial_delay.as_millis() as u64,
                "resubscribing after delay"
            );
            self.bus.publish(
                Event::new(EventKind::ResubscribeScheduled)
                    .with_subscription(Arc::clone(&self.name))
                    .with_attempt(1)
                    .with_delay(initial_delay),
            );
            pause_unless_stopped(&mut stopped, epoch, initial_delay).await;
        }

        let mut attempt: u32 = 0;
        loop {
            let mut handle = self.handle.lock().await;
            let (drops, checkpoint) = {
                let s = self.state.borrow();
                if !s.is_current(epoch) || !s.dropped {
                    return;
                }
                (
                    s.drops,
                    Checkpoint::new(self.name.as_ref(), s.last_processed_position),
                )
            };

            attempt += 1;
            self.state
                .send_modify(|s| s.phase = SubscriptionPhase::Resubscribing);
            tracing::warn!(
                subscription = %self.name,
                attempt,
                position = ?checkpoint.position,
                "resubscribing"
            );

            // New session first: the stale handle's own drop report is then ignored.
            let session = self.next_session();
            if let Some(stale) = handle.take() {
                stale.dispose().await;
            }

            let position = checkpoint.position;
            match self.subscriber.subscribe(checkpoint, self.sink(session)).await {
                Ok(new_handle) => {
                    if !self.state.borrow().is_current(epoch) {
                        new_handle.dispose().await;
                        tracing::debug!(subscription = %self.name, attempt, "run ended while resubscribing");
                        return;
                    }
                    *handle = Some(new_handle);
                    let restored = self.state.send_if_modified(|s| {
                        if !s.is_current(epoch) || s.drops != drops {
                            return false;
                        }
                        s.dropped = false;
                        s.phase = SubscriptionPhase::Running;
                        true
                    });
                    drop(handle);

                    if restored {
                        tracing::info!(subscription = %self.name, attempt, "subscription restored");
                        self.bus.publish(
                            Event::new(EventKind::SubscriptionRestored)
                                .with_subscription(Arc::clone(&self.name))
                                .with_attempt(attempt)
                                .with_position(position),
                        );
                        return;
                    }
                }
                Err(e) => {
                    drop(handle);
                    tracing::error!(
                        subscription = %self.name,
                        attempt,
                        error = %e,
                        "failed to resubscribe"
                    );
                    self.bus.publish(
                        Event::new(EventKind::ResubscribeFailed)
                            .with_subscription(Arc::clone(&self.name))
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );

                    let delay = self.cfg.retry.next(attempt - 1);
                    self.bus.publish(
                        Event::new(EventKind::ResubscribeScheduled)
                            .with_subscription(Arc::clone(&self.name))
                            .with_attempt(attempt + 1)
                            .with_delay(delay),
                    );
                    pause_unless_stopped(&mut stopped, epoch, delay).await;
                }
            }
        }
    }
}

/// Sleeps for `delay`, returning early once run `epoch` ends.
async fn pause_unless_stopped(
    state: &mut watch::Receiver<SubscriptionState>,
    epoch: u64,
    delay: Duration,
) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = state.wait_for(|s| !s.is_current(epoch)) => {}
    }
}
