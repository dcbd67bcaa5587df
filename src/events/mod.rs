//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish
//! what happens inside a subscription engine (start/stop, drops, recovery,
//! handler and decode failures, gap measurements).
//!
//! These are *not* domain events. Domain events travel through
//! [`ReceivedEvent`](crate::ReceivedEvent) and the handler pipeline; the events
//! here are for observability only.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: engine lifecycle, delivery path, resubscribe loop,
//!   gap measurer, `ObserverSet` workers (overflow/panic).
//! - **Consumers**: the observer listener spawned by
//!   [`EngineBuilder::build`](crate::EngineBuilder::build), which fans out to
//!   [`ObserverSet`](crate::ObserverSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
