//! # Event sources: the backend-facing contract.
//!
//! A backend adapter (replicated log, cloud queue, ...) implements
//! [`Subscriber`] and is injected into the engine. The engine hands it an
//! [`EventSink`] for every subscribe attempt; the adapter pushes normalized
//! [`ReceivedEvent`]s into the sink and reports connection loss through it.
//!
//! ```text
//!   engine ── subscribe(checkpoint, sink) ──► Subscriber (adapter)
//!      ▲                                          │
//!      │        sink.deliver(ReceivedEvent) ◄─────┤  per message (Ok = ack)
//!      │        sink.dropped(reason, error) ◄─────┘  on connection loss
//!      │
//!      └── SubscriptionHandle::dispose()  (stop / resubscribe)
//! ```
//!
//! ## Contents
//! - [`ReceivedEvent`] normalized envelope for one delivered message
//! - [`Subscriber`], [`DeliveryMode`], [`DropReason`] adapter capability
//! - [`EventSink`] callbacks into the engine, bound to one session
//! - [`SubscriptionHandle`] disposes one backend subscription
//! - [`InMemorySubscriber`] ordered in-process log (tests, demos, embedding)

mod handle;
mod memory;
mod received;
mod sink;
mod subscriber;

pub use handle::SubscriptionHandle;
pub use memory::InMemorySubscriber;
pub use received::ReceivedEvent;
pub use sink::EventSink;
pub use subscriber::{DeliveryMode, DropReason, Subscriber};

pub(crate) use sink::SessionTarget;
