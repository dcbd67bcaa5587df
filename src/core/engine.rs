//! # SubscriptionEngine: lifecycle of one named subscription.
//!
//! The engine owns everything one subscription needs: the backend
//! [`Subscriber`], the checkpoint store, the decoder table, the handler group
//! and the lifecycle bus. Backends call back into it through an
//! [`EventSink`]; the delivery path lives in `delivery.rs`, drop recovery in
//! `resubscribe.rs`, gap measurement in `gap.rs`.
//!
//! ## State machine
//! ```text
//!   Stopped ──start()──► Starting ──subscribe ok──► Running
//!      ▲                    │ err                     │ drop
//!      │                    ▼                         ▼
//!      └──────────────── Stopped                   Dropped ──► Resubscribing ──ok──► Running
//!      ▲                                              │              │ err (retry forever)
//!      └──────────────────── stop() ◄─────────────────┴──────────────┘
//! ```
//!
//! ## Rules
//! - At most one subscribe attempt runs at a time (the handle mutex).
//! - `running`, `dropped`, positions and the session live in one `watch` value.
//! - `stop()` is the only cancellation entry point; background loops observe
//!   `running` cooperatively.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::core::builder::EngineBuilder;
use crate::core::config::SubscriptionConfig;
use crate::core::gap::{GapMeasurer, GapTask};
use crate::core::health::{HealthCheck, HealthStatus};
use crate::core::state::{SubscriptionPhase, SubscriptionState};
use crate::error::SubscriptionError;
use crate::events::{Bus, Event, EventKind};
use crate::handlers::{EventHandlerDispatcher, EventTypeMap};
use crate::source::{EventSink, SessionTarget, Subscriber, SubscriptionHandle};

/// Shared core of an engine; backends hold it through their sinks.
pub(crate) struct Inner<E> {
    pub(crate) cfg: SubscriptionConfig,
    pub(crate) name: Arc<str>,
    pub(crate) subscriber: Arc<dyn Subscriber>,
    pub(crate) checkpoints: Arc<dyn CheckpointStore>,
    pub(crate) types: EventTypeMap<E>,
    pub(crate) dispatcher: EventHandlerDispatcher<E>,
    pub(crate) bus: Bus,
    pub(crate) state: Arc<watch::Sender<SubscriptionState>>,
    /// Live backend subscription; the lock also serializes subscribe attempts.
    pub(crate) handle: Mutex<Option<SubscriptionHandle>>,
    pub(crate) gap_task: Mutex<Option<GapTask>>,
    /// Stops the observer listener once the engine is gone.
    pub(crate) listener: CancellationToken,
}

impl<E> Drop for Inner<E> {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

impl<E> Inner<E>
where
    E: Send + Sync + 'static,
{
    pub(crate) fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Starts a new session and returns its number.
    pub(crate) fn next_session(&self) -> u64 {
        let mut session = 0;
        self.state.send_modify(|s| {
            s.session += 1;
            session = s.session;
        });
        session
    }

    pub(crate) fn sink(self: &Arc<Self>, session: u64) -> EventSink {
        EventSink::new(session, Arc::clone(self) as Arc<dyn SessionTarget>)
    }

    fn mark_stopped(&self) {
        self.state.send_modify(|s| {
            s.running = false;
            s.dropped = false;
            s.phase = SubscriptionPhase::Stopped;
        });
    }

    fn interrupted(&self) -> SubscriptionError {
        tracing::info!(subscription = %self.name, "stopped while starting");
        SubscriptionError::Interrupted {
            subscription: self.name.to_string(),
        }
    }

    fn gap_measurer(&self) -> Option<GapMeasurer> {
        let interval = self.cfg.measure_interval()?;
        Some(GapMeasurer {
            name: Arc::clone(&self.name),
            subscriber: Arc::clone(&self.subscriber),
            state: Arc::clone(&self.state),
            bus: self.bus.clone(),
            interval,
        })
    }
}

/// Checkpointed, self-healing subscription feeding one handler group.
///
/// Cheap to clone; clones control the same subscription.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use serde::Deserialize;
/// use subvisor::{
///     EventTypeMap, HandlerError, HandlerFn, InMemoryCheckpointStore, InMemorySubscriber,
///     SubscriptionConfig, SubscriptionEngine,
/// };
///
/// #[derive(Clone, Deserialize)]
/// struct Placed { id: u32 }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let log = Arc::new(InMemorySubscriber::new());
///     let engine = SubscriptionEngine::builder(SubscriptionConfig::new("orders"), log.clone())
///         .with_checkpoint_store(Arc::new(InMemoryCheckpointStore::new()))
///         .with_event_types(EventTypeMap::new().register("Placed", |p: Placed| p))
///         .with_handler(HandlerFn::arc("orders", "print", |p: Placed, _pos: Option<u64>| async move {
///             let _ = p.id;
///             Ok::<_, HandlerError>(())
///         }))
///         .build();
///
///     engine.start().await?;
///     log.append("order-1", "Placed", &serde_json::json!({ "id": 1 })).await;
///     engine.wait_for(|s| s.last_processed_position == Some(1)).await;
///     engine.stop().await;
///     Ok(())
/// }
/// ```
pub struct SubscriptionEngine<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for SubscriptionEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for SubscriptionEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<E> SubscriptionEngine<E>
where
    E: Send + Sync + 'static,
{
    /// Starts building an engine for `cfg` reading from `subscriber`.
    pub fn builder(cfg: SubscriptionConfig, subscriber: Arc<dyn Subscriber>) -> EngineBuilder<E> {
        EngineBuilder::new(cfg, subscriber)
    }

    pub(crate) fn from_inner(inner: Arc<Inner<E>>) -> Self {
        Self { inner }
    }

    /// Subscription name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Lifecycle event bus of this engine.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Number of handlers in this engine's group.
    pub fn handler_count(&self) -> usize {
        self.inner.dispatcher.len()
    }

    /// Loads the checkpoint and opens the backend subscription.
    ///
    /// On error the engine stays stopped and can be started again. A `stop()`
    /// racing this call wins: the freshly opened subscription is disposed, no
    /// `SubscriptionStarted` is published and
    /// [`SubscriptionError::Interrupted`] is returned.
    pub async fn start(&self) -> Result<(), SubscriptionError> {
        let inner = &self.inner;
        let mut handle = inner.handle.lock().await;

        // `running` goes up before subscribing so a drop reported while
        // `subscribe` is still in flight is not lost.
        let mut epoch = 0;
        let claimed = inner.state.send_if_modified(|s| {
            if s.running {
                return false;
            }
            s.running = true;
            s.dropped = false;
            s.current_gap = None;
            s.phase = SubscriptionPhase::Starting;
            s.epoch += 1;
            epoch = s.epoch;
            true
        });
        if !claimed {
            return Err(SubscriptionError::AlreadyRunning {
                subscription: inner.name.to_string(),
            });
        }

        let checkpoint = match inner.checkpoints.get_last_checkpoint(&inner.name).await {
            Ok(checkpoint) => checkpoint,
            Err(source) => {
                if inner.state.borrow().is_current(epoch) {
                    inner.mark_stopped();
                }
                tracing::error!(subscription = %inner.name, error = %source, "failed to load checkpoint");
                return Err(SubscriptionError::CheckpointLoad {
                    subscription: inner.name.to_string(),
                    source,
                });
            }
        };
        let current = inner.state.send_if_modified(|s| {
            if !s.is_current(epoch) {
                return false;
            }
            s.last_processed_position = checkpoint.position;
            true
        });
        if !current {
            return Err(inner.interrupted());
        }

        tracing::info!(
            subscription = %inner.name,
            backend = inner.subscriber.name(),
            position = ?checkpoint.position,
            "starting subscription"
        );

        let session = inner.next_session();
        let position = checkpoint.position;
        let opened = match inner.subscriber.subscribe(checkpoint, inner.sink(session)).await {
            Ok(h) => h,
            Err(e) => {
                if inner.state.borrow().is_current(epoch) {
                    inner.mark_stopped();
                }
                tracing::error!(subscription = %inner.name, error = %e, "failed to subscribe");
                return Err(e.into());
            }
        };

        // `stop()` does not wait for this lock before flipping `running`.
        let current = inner.state.send_if_modified(|s| {
            if !s.is_current(epoch) {
                return false;
            }
            if !s.dropped {
                s.phase = SubscriptionPhase::Running;
            }
            true
        });
        if !current {
            opened.dispose().await;
            return Err(inner.interrupted());
        }
        *handle = Some(opened);
        if let Some(measurer) = inner.gap_measurer() {
            *inner.gap_task.lock().await = Some(measurer.spawn());
        }
        drop(handle);

        tracing::info!(subscription = %inner.name, "subscription started");
        inner.bus.publish(
            Event::new(EventKind::SubscriptionStarted)
                .with_subscription(Arc::clone(&inner.name))
                .with_position(position),
        );
        Ok(())
    }

    /// Stops the subscription. Safe to call when not running, or twice.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let mut was_running = false;
        inner.state.send_modify(|s| {
            was_running = s.running;
            s.running = false;
            s.phase = SubscriptionPhase::Stopped;
        });

        let handle = inner.handle.lock().await.take();
        let gap_task = inner.gap_task.lock().await.take();

        if let Some(task) = gap_task {
            task.shutdown().await;
        }
        if let Some(handle) = handle {
            handle.dispose().await;
        }

        if was_running {
            let position = inner.state.borrow().last_processed_position;
            tracing::info!(subscription = %inner.name, position = ?position, "subscription stopped");
            inner.bus.publish(
                Event::new(EventKind::SubscriptionStopped)
                    .with_subscription(Arc::clone(&inner.name))
                    .with_position(position),
            );
        }
    }

    /// Unhealthy iff running and the backend subscription is lost.
    pub fn check_health(&self) -> HealthStatus {
        let state = self.inner.state.borrow();
        if state.is_degraded() {
            HealthStatus::unhealthy(format!("subscription '{}' is dropped", self.inner.name))
        } else {
            HealthStatus::Healthy
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SubscriptionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    pub fn last_processed_position(&self) -> Option<u64> {
        self.inner.state.borrow().last_processed_position
    }

    /// Waits until `predicate` holds for the state and returns that state.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SubscriptionState) -> bool,
    ) -> SubscriptionState {
        let mut rx = self.inner.state.subscribe();
        let reached = rx.wait_for(predicate).await.map(|s| s.clone());
        match reached {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Receiver following every state change.
    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.inner.state.subscribe()
    }
}

#[async_trait]
impl<E> HealthCheck for SubscriptionEngine<E>
where
    E: Send + Sync + 'static,
{
    fn component(&self) -> &str {
        self.name()
    }

    async fn check_health(&self) -> HealthStatus {
        SubscriptionEngine::check_health(self)
    }
}
