//! # subvisor
//!
//! **Subvisor** keeps event subscriptions alive for event-sourced applications.
//!
//! It consumes events from an external log or queue, decodes them, fans them
//! out to in-process handlers (projections, read models, integration
//! forwarders) and checkpoints its position so that a restart or a dropped
//! connection resumes where processing stopped. Delivery is at-least-once:
//! handlers must be idempotent.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────────────┐         ┌──────────────────────┐
//!  │  Subscriber (backend)│         │   CheckpointStore    │
//!  │ subscribe / head     │         │  get / store         │
//!  └──────────┬───────────┘         └──────────▲───────────┘
//!             │ EventSink::deliver / dropped   │
//!             ▼                                │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  SubscriptionEngine                                               │
//! │  - watch<SubscriptionState> (running, dropped, last position...)  │
//! │  - EventTypeMap (event type name ─► decoder)                      │
//! │  - EventHandlerDispatcher (handlers of this subscription group)   │
//! │  - GapMeasurer task (optional)                                    │
//! │  - resubscribe loop (spawned on drop)                             │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        ▼                                                  │ publishes
//!   ┌──────────┐  ┌──────────┐  ┌──────────────────┐        ▼
//!   │ handler  │  │ handler  │  │ProjectionHandler │   ┌──────────────┐
//!   └──────────┘  └──────────┘  │ └► DocumentStore │   │ Bus (events) │
//!                               └──────────────────┘   └──────┬───────┘
//!                                                             ▼
//!                                                       ObserverSet
//!                                                  ┌──────────┼──────────┐
//!                                                  ▼          ▼          ▼
//!                                              LogWriter  GapTracker   ...
//! ```
//!
//! ### Lifecycle
//! ```text
//! Stopped ──start()──► Starting ──subscribe ok──► Running
//!                          └─ error ─► Stopped (returned to caller)
//!
//! Running ──sink.dropped(reason)──► Dropped
//!   ├─ reason = Disposed ─► wait disposed_drop_delay
//!   └─► Resubscribing:
//!         loop while running && dropped {
//!             subscribe(last_processed_position)
//!             ├─ Ok  ─► Running, publish SubscriptionRestored
//!             └─ Err ─► publish ResubscribeFailed, sleep(retry.next(n))
//!         }
//!
//! any ──stop()──► Stopped (gap task joined, backend handle disposed)
//! ```
//!
//! ### Delivery
//! ```text
//! deliver(event)
//!   ├─► last_processed_position = event.global_position   (ordered mode)
//!   ├─► control event? ─────────────────────────────┐
//!   ├─► decode ─ unknown type / malformed ─► log ───┤
//!   ├─► dispatch to every handler concurrently      │
//!   │     (errors and panics logged, never fatal)   │
//!   └─► store checkpoint ◄──────────────────────────┘
//!          └─ failure ─► CheckpointPolicy (Propagate / Retry / Resubscribe)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                                   |
//! |-------------------|---------------------------------------------------------------|------------------------------------------------------|
//! | **Engine**        | Lifecycle, checkpointing, resubscribe, health.                | [`SubscriptionEngine`], [`EngineBuilder`]            |
//! | **Backends**      | Contract implemented per log / queue client.                  | [`Subscriber`], [`EventSink`], [`SubscriptionHandle`]|
//! | **Checkpoints**   | Where the last processed position is kept.                    | [`CheckpointStore`], [`FileCheckpointStore`]         |
//! | **Handlers**      | User code reacting to decoded events.                         | [`EventHandler`], [`HandlerFn`], [`EventTypeMap`]    |
//! | **Projections**   | Declarative upserts into a document store.                    | [`Projection`], [`ProjectionHandler`], [`Update`]    |
//! | **Observability** | Lifecycle events, observers, lag tracking.                    | [`Event`], [`Observe`], [`LogWriter`], [`GapTracker`]|
//! | **Policies**      | Resubscribe delays and checkpoint failure handling.           | [`BackoffPolicy`], [`CheckpointPolicy`]              |
//! | **Errors**        | Typed errors for every collaborator.                          | [`SubscriptionError`], [`StoreError`]                |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use serde_json::json;
//! use subvisor::{
//!     EventTypeMap, HandlerError, HandlerFn, InMemoryCheckpointStore, InMemorySubscriber,
//!     SubscriptionConfig, SubscriptionEngine,
//! };
//!
//! #[derive(Clone, Deserialize)]
//! struct Greeted { name: String }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = Arc::new(InMemorySubscriber::new());
//!     let checkpoints = Arc::new(InMemoryCheckpointStore::new());
//!
//!     let engine = SubscriptionEngine::builder(SubscriptionConfig::new("greeter"), log.clone())
//!         .with_checkpoint_store(checkpoints)
//!         .with_event_types(EventTypeMap::new().register("Greeted", |g: Greeted| g))
//!         .with_handler(HandlerFn::arc("greeter", "printer", |g: Greeted, pos: Option<u64>| async move {
//!             println!("hello {} (at {pos:?})", g.name);
//!             Ok::<_, HandlerError>(())
//!         }))
//!         .build();
//!
//!     engine.start().await?;
//!     log.append("greetings", "Greeted", &json!({ "name": "Ada" })).await;
//!     engine.wait_for(|s| s.last_processed_position == Some(1)).await;
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```
mod checkpoint;
mod core;
mod error;
mod events;
mod handlers;
mod observers;
mod policies;
mod projection;
mod source;

// ---- Public re-exports ----

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
pub use crate::core::{
    EngineBuilder, HealthCheck, HealthStatus, SubscriptionConfig, SubscriptionEngine,
    SubscriptionPhase, SubscriptionState, unhealthy_components,
};
pub use error::{DecodeError, HandlerError, StoreError, SubscribeError, SubscriptionError};
pub use events::{Bus, Event, EventKind};
pub use handlers::{
    DispatchOutcome, EventHandler, EventHandlerDispatcher, EventTypeMap, HandlerFailure, HandlerFn,
    HandlerRef,
};
pub use observers::{GapTracker, LogWriter, Observe, ObserverSet};
pub use policies::{BackoffPolicy, CheckpointPolicy, JitterPolicy};
pub use projection::{
    DocumentStore, Filter, InMemoryDocumentStore, ProjectedDocument, Projection, ProjectionHandler,
    Update, UpdateOperation, UpsertOutcome, find_document,
};
pub use source::{
    DeliveryMode, DropReason, EventSink, InMemorySubscriber, ReceivedEvent, Subscriber,
    SubscriptionHandle,
};
