use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;

/// Shared handle to a handler.
pub type HandlerRef<E> = Arc<dyn EventHandler<E>>;

/// Reacts to decoded domain events of type `E`.
///
/// Handlers run concurrently with the other handlers of the same group, once
/// per delivered event. A returned error (or a panic) is logged and reported;
/// it never prevents the checkpoint from advancing, so handlers should be
/// idempotent.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use subvisor::{EventHandler, HandlerError};
///
/// struct Audit;
///
/// #[async_trait]
/// impl EventHandler<String> for Audit {
///     fn subscription_group(&self) -> &str { "audit" }
///
///     async fn handle_event(&self, event: &String, _position: Option<u64>) -> Result<(), HandlerError> {
///         if event.is_empty() {
///             return Err(HandlerError::fail("empty event"));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler<E>: Send + Sync + 'static
where
    E: Send + Sync + 'static,
{
    /// Name of the subscription this handler belongs to.
    fn subscription_group(&self) -> &str;

    /// Handles one event delivered at `position`.
    async fn handle_event(&self, event: &E, position: Option<u64>) -> Result<(), HandlerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
