//! # ObserverSet: non-blocking fan-out over multiple observers
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-observer FIFO (queue order).
//! - Panics inside observers are caught and reported (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different observers.
//! - No retries on queue overflow (the event is dropped for that observer).

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event};
use crate::observers::Observe;

struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out with per-observer bounded queues and worker tasks.
pub struct ObserverSet {
    channels: Vec<ObserverChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl ObserverSet {
    /// Creates the set and spawns one worker per observer.
    ///
    /// Overflow and panic reports are published on `bus`.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for obs in observers {
            let name = obs.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(obs.queue_capacity().max(1));
            let worker_bus = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = obs.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = format!("{panic:?}");
                        tracing::error!(observer = name, panic = %info, "observer panicked");
                        if !ev.is_observer_internal() {
                            worker_bus.publish(Event::observer_panicked(name, info));
                        }
                    }
                }
            });

            channels.push(ObserverChannel { name, sender: tx });
            workers.push(handle);
        }

        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Fans one event out to all observers without waiting.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            tracing::warn!(observer = channel.name, reason, "observer dropped event");
            // Reporting an overflow of an overflow report would feed itself.
            if !event.is_observer_internal() {
                self.bus
                    .publish(Event::observer_overflow(channel.name, reason));
            }
        }
    }

    /// Closes all queues and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::events::EventKind;

    #[derive(Default)]
    struct Collect(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Observe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
    }

    struct Panicky;

    #[async_trait]
    impl Observe for Panicky {
        async fn on_event(&self, _ev: &Event) {
            panic!("observer bug");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    struct Stuck;

    #[async_trait]
    impl Observe for Stuck {
        async fn on_event(&self, _ev: &Event) {
            std::future::pending::<()>().await;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains_on_shutdown() {
        let collect = Arc::new(Collect::default());
        let set = ObserverSet::new(vec![collect.clone()], Bus::new(8));
        assert_eq!(set.len(), 1);

        set.emit(&Event::new(EventKind::SubscriptionStarted));
        set.emit(&Event::new(EventKind::SubscriptionStopped));
        set.shutdown().await;

        assert_eq!(
            *collect.0.lock().unwrap(),
            vec![EventKind::SubscriptionStarted, EventKind::SubscriptionStopped]
        );
    }

    #[tokio::test]
    async fn panics_are_reported_on_the_bus() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let set = ObserverSet::new(vec![Arc::new(Panicky)], bus.clone());

        set.emit(&Event::new(EventKind::GapMeasured));
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no panic report")
            .unwrap();
        assert_eq!(ev.kind, EventKind::ObserverPanicked);
        assert_eq!(ev.handler.as_deref(), Some("panicky"));
    }

    #[tokio::test]
    async fn overflow_is_reported_on_the_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = ObserverSet::new(vec![Arc::new(Stuck)], bus.clone());

        for _ in 0..4 {
            set.emit(&Event::new(EventKind::GapMeasured));
            tokio::task::yield_now().await;
        }

        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no overflow report")
            .unwrap();
        assert_eq!(ev.kind, EventKind::ObserverOverflow);
        assert_eq!(ev.handler.as_deref(), Some("stuck"));
    }
}
