use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::observers::Observe;

/// Observer that forwards lifecycle events to `tracing`.
///
/// The engine already logs at the call sites; this writer is for setups that
/// want one consolidated, event-shaped stream under the `subvisor::events` target.
pub struct LogWriter;

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let sub = e.subscription.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::SubscriptionStarted => {
                tracing::info!(target: "subvisor::events", seq = e.seq, subscription = sub, position = ?e.position, "[started]");
            }
            EventKind::SubscriptionStopped => {
                tracing::info!(target: "subvisor::events", seq = e.seq, subscription = sub, position = ?e.position, "[stopped]");
            }
            EventKind::SubscriptionDropped => {
                tracing::warn!(target: "subvisor::events", seq = e.seq, subscription = sub, reason = ?e.reason, "[dropped]");
            }
            EventKind::ResubscribeScheduled => {
                tracing::info!(target: "subvisor::events", seq = e.seq, subscription = sub, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "[resubscribe-scheduled]");
            }
            EventKind::ResubscribeFailed => {
                tracing::warn!(target: "subvisor::events", seq = e.seq, subscription = sub, attempt = ?e.attempt, reason = ?e.reason, "[resubscribe-failed]");
            }
            EventKind::SubscriptionRestored => {
                tracing::info!(target: "subvisor::events", seq = e.seq, subscription = sub, attempt = ?e.attempt, position = ?e.position, "[restored]");
            }
            EventKind::HandlerFailed => {
                tracing::warn!(target: "subvisor::events", seq = e.seq, subscription = sub, handler = ?e.handler, event_type = ?e.event_type, position = ?e.position, reason = ?e.reason, "[handler-failed]");
            }
            EventKind::DecodeFailed => {
                tracing::warn!(target: "subvisor::events", seq = e.seq, subscription = sub, event_type = ?e.event_type, position = ?e.position, reason = ?e.reason, "[decode-failed]");
            }
            EventKind::CheckpointFailed => {
                tracing::warn!(target: "subvisor::events", seq = e.seq, subscription = sub, position = ?e.position, attempt = ?e.attempt, reason = ?e.reason, "[checkpoint-failed]");
            }
            EventKind::GapMeasured => {
                tracing::debug!(target: "subvisor::events", seq = e.seq, subscription = sub, gap = ?e.gap, head = ?e.position, "[gap]");
            }
            EventKind::ObserverPanicked | EventKind::ObserverOverflow => {
                tracing::warn!(target: "subvisor::events", seq = e.seq, observer = ?e.handler, reason = ?e.reason, "[observer]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
