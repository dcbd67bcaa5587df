use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
use crate::core::config::SubscriptionConfig;
use crate::core::engine::{Inner, SubscriptionEngine};
use crate::core::state::SubscriptionState;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::{EventHandlerDispatcher, EventTypeMap, HandlerRef};
use crate::observers::{Observe, ObserverSet};
use crate::source::{DeliveryMode, Subscriber};

/// Builder wiring a [`SubscriptionEngine`] together.
///
/// Only the config and the subscriber are required. Without a checkpoint
/// store the engine keeps checkpoints in memory (lost on restart).
pub struct EngineBuilder<E> {
    cfg: SubscriptionConfig,
    subscriber: Arc<dyn Subscriber>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    types: EventTypeMap<E>,
    handlers: Vec<HandlerRef<E>>,
    observers: Vec<Arc<dyn Observe>>,
}

impl<E> EngineBuilder<E>
where
    E: Send + Sync + 'static,
{
    pub fn new(cfg: SubscriptionConfig, subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            cfg,
            subscriber,
            checkpoints: None,
            types: EventTypeMap::new(),
            handlers: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Decoders for the event types this subscription understands.
    pub fn with_event_types(mut self, types: EventTypeMap<E>) -> Self {
        self.types = types;
        self
    }

    /// Adds one handler. Handlers of other groups are accepted and ignored.
    pub fn with_handler(mut self, handler: HandlerRef<E>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_handlers(mut self, handlers: impl IntoIterator<Item = HandlerRef<E>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Adds an observer of this engine's lifecycle events.
    pub fn with_observer(mut self, observer: Arc<dyn Observe>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers(mut self, observers: impl IntoIterator<Item = Arc<dyn Observe>>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Builds the engine (stopped).
    ///
    /// Must run inside a Tokio runtime when observers are registered: their
    /// listener and workers are spawned here.
    pub fn build(self) -> SubscriptionEngine<E> {
        let name: Arc<str> = Arc::from(self.cfg.name.as_str());
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let registered = self.handlers.len();
        let dispatcher = EventHandlerDispatcher::new(Arc::clone(&name), self.handlers);
        tracing::debug!(
            subscription = %name,
            handlers = ?dispatcher.handler_names(),
            ignored = registered - dispatcher.len(),
            "handler group resolved"
        );

        let checkpoints = self.checkpoints.unwrap_or_else(|| {
            if self.subscriber.delivery_mode() == DeliveryMode::Ordered {
                tracing::debug!(subscription = %name, "no checkpoint store configured, keeping checkpoints in memory");
            }
            Arc::new(InMemoryCheckpointStore::new())
        });

        let listener = CancellationToken::new();
        if !self.observers.is_empty() {
            let set = ObserverSet::new(self.observers, bus.clone());
            spawn_observer_listener(bus.subscribe(), set, bus.clone(), listener.clone());
        }

        let (state, _) = watch::channel(SubscriptionState::default());
        SubscriptionEngine::from_inner(Arc::new(Inner {
            cfg: self.cfg,
            name,
            subscriber: self.subscriber,
            checkpoints,
            types: self.types,
            dispatcher,
            bus,
            state: Arc::new(state),
            handle: Mutex::new(None),
            gap_task: Mutex::new(None),
            listener,
        }))
    }
}

/// Forwards bus events to the observer set until the engine is dropped.
fn spawn_observer_listener(
    mut rx: broadcast::Receiver<Event>,
    set: ObserverSet,
    bus: Bus,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "observer listener lagged behind the bus");
                        bus.publish(
                            Event::new(EventKind::ObserverOverflow)
                                .with_handler("observer-listener")
                                .with_reason(format!("lagged, skipped {skipped} events")),
                        );
                    }
                }
            }
        }
        set.shutdown().await;
    });
}
