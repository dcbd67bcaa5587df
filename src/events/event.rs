//! # Lifecycle events emitted by a subscription engine.
//!
//! [`EventKind`] classifies what happened:
//! - **Lifecycle**: started, stopped
//! - **Recovery**: dropped, resubscribe scheduled/failed, restored
//! - **Pipeline**: handler failed, decode failed, checkpoint failed
//! - **Metrics**: gap measured
//! - **Observers**: overflow, panic
//!
//! [`Event`] carries a global sequence number, a timestamp and optional
//! metadata depending on the kind.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use subvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ResubscribeScheduled)
//!     .with_subscription("orders")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(1));
//!
//! assert_eq!(ev.subscription.as_deref(), Some("orders"));
//! assert_eq!(ev.delay_ms, Some(1000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle ===
    /// Subscription opened and the engine is running.
    ///
    /// Sets: `subscription`, `position` (resume checkpoint, if any).
    SubscriptionStarted,

    /// Engine stopped on request.
    ///
    /// Sets: `subscription`, `position` (last processed, if any).
    SubscriptionStopped,

    // === Recovery ===
    /// Backend reported the subscription as lost.
    ///
    /// Sets: `subscription`, `reason` (drop reason and error).
    SubscriptionDropped,

    /// A resubscribe attempt will run after `delay_ms`.
    ///
    /// Sets: `subscription`, `attempt`, `delay_ms`.
    ResubscribeScheduled,

    /// A resubscribe attempt failed.
    ///
    /// Sets: `subscription`, `attempt`, `reason`.
    ResubscribeFailed,

    /// Subscription re-established after a drop.
    ///
    /// Sets: `subscription`, `attempt`, `position` (resume checkpoint).
    SubscriptionRestored,

    // === Pipeline ===
    /// One handler failed (or panicked) for an event.
    ///
    /// Sets: `subscription`, `handler`, `event_type`, `position`, `reason`.
    HandlerFailed,

    /// Payload could not be decoded; the event was skipped.
    ///
    /// Sets: `subscription`, `event_type`, `position`, `reason`.
    DecodeFailed,

    /// Checkpoint write failed.
    ///
    /// Sets: `subscription`, `position`, `attempt`, `reason`.
    CheckpointFailed,

    // === Metrics ===
    /// Distance between the source head and the last processed position.
    ///
    /// Sets: `subscription`, `gap`, `position` (head).
    GapMeasured,

    // === Observers ===
    /// Observer panicked while processing an event.
    ///
    /// Sets: `handler` (observer name), `reason`.
    ObserverPanicked,

    /// Observer queue was full or closed; the event was dropped for it.
    ///
    /// Sets: `handler` (observer name), `reason`.
    ObserverOverflow,
}

/// Lifecycle event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Subscription name, if applicable.
    pub subscription: Option<Arc<str>>,
    /// Handler or observer name, if applicable.
    pub handler: Option<Arc<str>>,
    /// Domain event type of the message being processed.
    pub event_type: Option<Arc<str>>,
    /// Stream position related to the event.
    pub position: Option<u64>,
    /// Measured lag in positions.
    pub gap: Option<u64>,
    /// Scheduled delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Attempt counter (starting from 1).
    pub attempt: Option<u32>,
    /// Human-readable reason (errors, drop reasons, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subscription: None,
            handler: None,
            event_type: None,
            position: None,
            gap: None,
            delay_ms: None,
            attempt: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_subscription(mut self, name: impl Into<Arc<str>>) -> Self {
        self.subscription = Some(name.into());
        self
    }

    #[inline]
    pub fn with_handler(mut self, name: impl Into<Arc<str>>) -> Self {
        self.handler = Some(name.into());
        self
    }

    #[inline]
    pub fn with_event_type(mut self, event_type: impl Into<Arc<str>>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Attaches a position; `None` leaves the field unset.
    #[inline]
    pub fn with_position(mut self, position: Option<u64>) -> Self {
        self.position = position;
        self
    }

    #[inline]
    pub fn with_gap(mut self, gap: u64) -> Self {
        self.gap = Some(gap);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating at `u32::MAX`).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates an observer overflow event.
    pub(crate) fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::ObserverOverflow)
            .with_handler(observer)
            .with_reason(format!("observer={observer} reason={reason}"))
    }

    /// Creates an observer panic event.
    pub(crate) fn observer_panicked(observer: &'static str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked)
            .with_handler(observer)
            .with_reason(info)
    }

    /// True for events emitted by the observer machinery itself.
    #[inline]
    pub fn is_observer_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ObserverOverflow | EventKind::ObserverPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::GapMeasured);
        let b = Event::new(EventKind::GapMeasured);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::ResubscribeScheduled)
            .with_delay(Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn observer_events_are_flagged_internal() {
        assert!(Event::observer_overflow("log", "full").is_observer_internal());
        assert!(!Event::new(EventKind::HandlerFailed).is_observer_internal());
    }
}
