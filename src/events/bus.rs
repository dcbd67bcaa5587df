//! # Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the engine's tasks (delivery
//! path, resubscribe loop, gap measurer) can publish without awaiting anyone.
//!
//! ```text
//! Publishers (many):                    Consumer (one per engine):
//!   delivery    ──┐
//!   resubscribe ──┼──────► Bus ───────► observer listener ────► ObserverSet
//!   gap measurer──┘   (broadcast chan)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails.
//! - A single ring buffer of `capacity` events is shared by all receivers;
//!   receivers that fall behind get `RecvError::Lagged(n)` and skip ahead.
//! - Events published while nobody listens are lost.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events.
///
/// Cheap to clone; all clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring-buffer capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every active receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
