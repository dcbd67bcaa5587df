//! # Callbacks from a backend adapter into the engine.
//!
//! Every subscribe attempt gets its own [`EventSink`] tagged with a session
//! number. Drops reported by an older session are ignored by the engine, so
//! an adapter never has to worry about late callbacks from a subscription it
//! was already asked to dispose.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::SubscriptionError;
use crate::source::{DropReason, ReceivedEvent};

/// Engine side of a sink.
pub(crate) trait SessionTarget: Send + Sync + 'static {
    fn deliver(
        self: Arc<Self>,
        session: u64,
        event: ReceivedEvent,
    ) -> BoxFuture<'static, Result<(), SubscriptionError>>;

    fn dropped(self: Arc<Self>, session: u64, reason: DropReason, error: Option<String>);
}

/// Delivery and drop callbacks bound to one subscribe attempt.
///
/// Cheap to clone; adapters typically move a clone into their read loop.
#[derive(Clone)]
pub struct EventSink {
    session: u64,
    target: Arc<dyn SessionTarget>,
}

impl EventSink {
    pub(crate) fn new(session: u64, target: Arc<dyn SessionTarget>) -> Self {
        Self { session, target }
    }

    /// Session number this sink belongs to.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Hands one message to the engine and waits until it is fully handled.
    ///
    /// Ordered backends must not deliver the next message before this returns.
    /// For acknowledged backends `Ok` means ack and `Err` means nack.
    pub async fn deliver(&self, event: ReceivedEvent) -> Result<(), SubscriptionError> {
        Arc::clone(&self.target).deliver(self.session, event).await
    }

    /// Reports that the backend subscription was lost.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dropped(&self, reason: DropReason, error: Option<String>) {
        Arc::clone(&self.target).dropped(self.session, reason, error);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every callback; `fail_at` makes delivery of that position fail.
    #[derive(Default)]
    pub(crate) struct RecordingTarget {
        pub delivered: Mutex<Vec<(u64, u64)>>,
        pub drops: Mutex<Vec<(u64, DropReason, Option<String>)>>,
        pub fail_at: Option<u64>,
    }

    impl SessionTarget for RecordingTarget {
        fn deliver(
            self: Arc<Self>,
            session: u64,
            event: ReceivedEvent,
        ) -> BoxFuture<'static, Result<(), SubscriptionError>> {
            Box::pin(async move {
                self.delivered
                    .lock()
                    .unwrap()
                    .push((session, event.global_position));
                if self.fail_at == Some(event.global_position) {
                    return Err(SubscriptionError::AlreadyRunning {
                        subscription: "recording".into(),
                    });
                }
                Ok(())
            })
        }

        fn dropped(self: Arc<Self>, session: u64, reason: DropReason, error: Option<String>) {
            self.drops.lock().unwrap().push((session, reason, error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingTarget;
    use super::*;

    #[tokio::test]
    async fn sink_tags_callbacks_with_its_session() {
        let target = Arc::new(RecordingTarget::default());
        let sink = EventSink::new(7, target.clone());

        sink.deliver(ReceivedEvent::new("a", "T", 3, Vec::new()))
            .await
            .unwrap();
        sink.dropped(DropReason::ConnectionLost, Some("eof".into()));

        assert_eq!(*target.delivered.lock().unwrap(), vec![(7, 3)]);
        let drops = target.drops.lock().unwrap();
        assert_eq!(drops[0].0, 7);
        assert_eq!(drops[0].1, DropReason::ConnectionLost);
        assert_eq!(drops[0].2.as_deref(), Some("eof"));
    }
}
