//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(E, Option<u64>) -> Fut`. The event is
//! cloned into each call, so the returned future owns everything it touches.
//!
//! ## Example
//! ```rust
//! use subvisor::{EventHandler, HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef<String> = HandlerFn::arc("orders", "printer", |ev: String, pos: Option<u64>| async move {
//!     let _ = (ev, pos);
//!     Ok::<_, HandlerError>(())
//! });
//!
//! assert_eq!(h.subscription_group(), "orders");
//! assert_eq!(h.name(), "printer");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::handlers::EventHandler;

/// Closure-backed handler.
#[derive(Debug)]
pub struct HandlerFn<F> {
    group: Cow<'static, str>,
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(group: impl Into<Cow<'static, str>>, name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(
        group: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Arc<Self> {
        Arc::new(Self::new(group, name, f))
    }
}

#[async_trait]
impl<E, F, Fut> EventHandler<E> for HandlerFn<F>
where
    E: Clone + Send + Sync + 'static,
    F: Fn(E, Option<u64>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn subscription_group(&self) -> &str {
        &self.group
    }

    async fn handle_event(&self, event: &E, position: Option<u64>) -> Result<(), HandlerError> {
        (self.f)(event.clone(), position).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
