//! # Delivery path: one backend message through the pipeline.
//!
//! ```text
//! sink.deliver(ev)
//!   ├─ record last_processed_position        (ordered backends, before dispatch)
//!   ├─ control event? ──────────────────────► complete
//!   ├─ decode: unknown type / malformed ────► log, complete
//!   ├─ dispatch to the handler group (join_all, failures isolated)
//!   └─ complete
//!        ├─ Ordered:      store checkpoint (CheckpointPolicy on failure)
//!        └─ Acknowledged: ack, or nack when a handler asked for redelivery
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::checkpoint::Checkpoint;
use crate::core::engine::Inner;
use crate::error::SubscriptionError;
use crate::events::{Event, EventKind};
use crate::handlers::DispatchOutcome;
use crate::policies::CheckpointPolicy;
use crate::source::{DeliveryMode, DropReason, ReceivedEvent, SessionTarget};

impl<E> SessionTarget for Inner<E>
where
    E: Send + Sync + 'static,
{
    fn deliver(
        self: Arc<Self>,
        session: u64,
        event: ReceivedEvent,
    ) -> BoxFuture<'static, Result<(), SubscriptionError>> {
        Box::pin(async move { self.handle_delivered(session, event).await })
    }

    fn dropped(self: Arc<Self>, session: u64, reason: DropReason, error: Option<String>) {
        self.on_dropped(session, reason, error);
    }
}

impl<E> Inner<E>
where
    E: Send + Sync + 'static,
{
    pub(crate) async fn handle_delivered(
        self: &Arc<Self>,
        session: u64,
        event: ReceivedEvent,
    ) -> Result<(), SubscriptionError> {
        let position = Some(event.global_position);
        let mode = self.subscriber.delivery_mode();

        tracing::debug!(
            subscription = %self.name,
            event_type = %event.event_type,
            position = event.global_position,
            stream = %event.stream,
            "event received"
        );
        if mode == DeliveryMode::Ordered {
            self.state
                .send_modify(|s| s.last_processed_position = position);
        }

        if self.subscriber.is_control_event(&event) {
            return self.complete(session, mode, position, None).await;
        }

        let outcome = match self.types.decode(&event.event_type, &event.data) {
            Ok(Some(decoded)) => {
                let outcome = self
                    .dispatcher
                    .dispatch(&decoded, position, &event.event_type)
                    .await;
                self.report_failures(&outcome, &event);
                Some(outcome)
            }
            Ok(None) => {
                tracing::debug!(
                    subscription = %self.name,
                    event_type = %event.event_type,
                    "no decoder registered for event type"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    subscription = %self.name,
                    event_type = %event.event_type,
                    position = event.global_position,
                    error = %e,
                    "failed to decode event"
                );
                self.bus.publish(
                    Event::new(EventKind::DecodeFailed)
                        .with_subscription(Arc::clone(&self.name))
                        .with_event_type(Arc::clone(&event.event_type))
                        .with_position(position)
                        .with_reason(e.to_string()),
                );
                None
            }
        };

        self.complete(session, mode, position, outcome.as_ref()).await
    }

    fn report_failures(&self, outcome: &DispatchOutcome, event: &ReceivedEvent) {
        for failure in &outcome.failures {
            self.bus.publish(
                Event::new(EventKind::HandlerFailed)
                    .with_subscription(Arc::clone(&self.name))
                    .with_handler(Arc::clone(&failure.handler))
                    .with_event_type(Arc::clone(&event.event_type))
                    .with_position(Some(event.global_position))
                    .with_reason(failure.error.as_str()),
            );
        }
    }

    async fn complete(
        self: &Arc<Self>,
        session: u64,
        mode: DeliveryMode,
        position: Option<u64>,
        outcome: Option<&DispatchOutcome>,
    ) -> Result<(), SubscriptionError> {
        match mode {
            DeliveryMode::Ordered => self.commit(session, position).await,
            DeliveryMode::Acknowledged => {
                let failed = outcome.map_or(0, DispatchOutcome::retryable);
                if failed > 0 {
                    return Err(SubscriptionError::HandlerRetry {
                        subscription: self.name.to_string(),
                        position,
                        failed,
                    });
                }
                self.state
                    .send_modify(|s| s.last_processed_position = position);
                Ok(())
            }
        }
    }

    /// Stores the checkpoint at `position`, applying the configured policy on failure.
    async fn commit(
        self: &Arc<Self>,
        session: u64,
        position: Option<u64>,
    ) -> Result<(), SubscriptionError> {
        let checkpoint = Checkpoint::new(self.name.as_ref(), position);
        let policy = self.cfg.checkpoint_policy;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let source = match self.checkpoints.store_checkpoint(&checkpoint).await {
                Ok(_) => return Ok(()),
                Err(e) => e,
            };

            tracing::error!(
                subscription = %self.name,
                position = ?position,
                attempt,
                error = %source,
                "failed to store checkpoint"
            );
            self.bus.publish(
                Event::new(EventKind::CheckpointFailed)
                    .with_subscription(Arc::clone(&self.name))
                    .with_position(position)
                    .with_attempt(attempt)
                    .with_reason(source.to_string()),
            );

            let running = self.is_running();
            match policy {
                CheckpointPolicy::Retry { backoff, .. }
                    if running && attempt <= policy.extra_attempts() =>
                {
                    tokio::time::sleep(backoff.next(attempt - 1)).await;
                }
                CheckpointPolicy::Resubscribe => {
                    self.on_dropped(session, DropReason::CheckpointFailed, Some(source.to_string()));
                    return Ok(());
                }
                _ => {
                    return Err(SubscriptionError::CheckpointStore {
                        subscription: self.name.to_string(),
                        position,
                        source,
                    });
                }
            }
        }
    }
}
