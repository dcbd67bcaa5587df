//! # Core observer trait
//!
//! `Observe` is the extension point for plugging custom consumers of lifecycle
//! events into an engine. Each observer is driven by a dedicated worker loop
//! fed by a bounded queue owned by the [`ObserverSet`](crate::ObserverSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   engine nor other observers.
//! - Each observer declares its queue capacity via
//!   [`Observe::queue_capacity`]. On overflow, events for that observer are
//!   dropped and an `ObserverOverflow` event is published.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for lifecycle event observers.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use subvisor::{Event, EventKind, Observe};
///
/// struct DropAlarm;
///
/// #[async_trait]
/// impl Observe for DropAlarm {
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::SubscriptionDropped {
///             // page someone...
///         }
///     }
///
///     fn name(&self) -> &'static str { "drop-alarm" }
/// }
/// ```
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this observer's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
