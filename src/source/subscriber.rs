//! # Backend subscriber capability.
//!
//! [`Subscriber`] is the small contract each backend adapter implements. It
//! replaces per-backend subclassing: the engine owns the lifecycle and calls
//! into the adapter only to open a subscription, query the head, and classify
//! control events.

use std::fmt;

use async_trait::async_trait;

use crate::checkpoint::Checkpoint;
use crate::error::SubscribeError;
use crate::source::{EventSink, ReceivedEvent, SubscriptionHandle};

/// How a backend expects delivery progress to be recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Globally ordered log: the engine writes a checkpoint after each event.
    #[default]
    Ordered,
    /// Queue with per-message acknowledgment: the result of
    /// [`EventSink::deliver`] is the ack, no checkpoints are written.
    Acknowledged,
}

/// Why a backend subscription was lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The subscription was disposed locally (stop or replacement).
    Disposed,
    /// The connection to the backend was lost.
    ConnectionLost,
    /// The backend terminated the subscription with an error.
    ServerError,
    /// The local side failed while processing (e.g. a delivery error).
    SubscriberError,
    /// A checkpoint write failed under [`CheckpointPolicy::Resubscribe`](crate::CheckpointPolicy::Resubscribe).
    CheckpointFailed,
}

impl DropReason {
    /// True when the drop was caused by local disposal.
    ///
    /// These are expected during shutdown races, so recovery waits longer.
    pub fn is_local_disposal(&self) -> bool {
        matches!(self, DropReason::Disposed)
    }

    /// Stable snake_case label.
    pub fn as_label(&self) -> &'static str {
        match self {
            DropReason::Disposed => "disposed",
            DropReason::ConnectionLost => "connection_lost",
            DropReason::ServerError => "server_error",
            DropReason::SubscriberError => "subscriber_error",
            DropReason::CheckpointFailed => "checkpoint_failed",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Backend adapter capability.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use subvisor::{Checkpoint, EventSink, SubscribeError, Subscriber, SubscriptionHandle};
///
/// struct Silent;
///
/// #[async_trait]
/// impl Subscriber for Silent {
///     async fn subscribe(
///         &self,
///         _checkpoint: Checkpoint,
///         _sink: EventSink,
///     ) -> Result<SubscriptionHandle, SubscribeError> {
///         Ok(SubscriptionHandle::new(CancellationToken::new()))
///     }
/// }
/// ```
#[async_trait]
pub trait Subscriber: Send + Sync + 'static {
    /// Opens a subscription resuming after `checkpoint.position`
    /// (from the beginning when `None`).
    ///
    /// Every message must be pushed through `sink.deliver`; connection loss
    /// must be reported through `sink.dropped`.
    async fn subscribe(
        &self,
        checkpoint: Checkpoint,
        sink: EventSink,
    ) -> Result<SubscriptionHandle, SubscribeError>;

    /// Current head of the source, if the backend has one.
    ///
    /// Used only for gap measurement.
    async fn head_position(&self) -> Result<Option<u64>, SubscribeError> {
        Ok(None)
    }

    /// How delivery progress is recorded for this backend.
    fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::Ordered
    }

    /// True for backend-internal events that should only advance the
    /// checkpoint and never reach handlers.
    fn is_control_event(&self, _event: &ReceivedEvent) -> bool {
        false
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
