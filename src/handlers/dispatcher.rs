//! # Concurrent fan-out of one event to every handler of a group.
//!
//! ## Guarantees
//! - All handlers start before any of them is awaited to completion.
//! - `dispatch` returns only after every handler finished.
//! - A failing or panicking handler is isolated: the others still run, and the
//!   failure is logged and returned in [`DispatchOutcome::failures`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;

use crate::handlers::HandlerRef;

/// One handler that did not complete successfully.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: Arc<str>,
    pub error: String,
    /// Redelivering the event could succeed (see [`HandlerError::is_retryable`](crate::HandlerError::is_retryable)).
    pub retryable: bool,
}

/// Result of dispatching one event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that returned `Ok`.
    pub handled: usize,
    /// Handlers that returned an error or panicked.
    pub failures: Vec<HandlerFailure>,
}

impl DispatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures that a redelivery could fix.
    pub fn retryable(&self) -> usize {
        self.failures.iter().filter(|f| f.retryable).count()
    }
}

/// Dispatches events to the handlers of one subscription group.
pub struct EventHandlerDispatcher<E> {
    subscription: Arc<str>,
    handlers: Vec<HandlerRef<E>>,
}

impl<E> EventHandlerDispatcher<E>
where
    E: Send + Sync + 'static,
{
    /// Keeps only the handlers whose group equals `subscription`.
    pub fn new(subscription: impl Into<Arc<str>>, handlers: Vec<HandlerRef<E>>) -> Self {
        let subscription = subscription.into();
        let handlers: Vec<_> = handlers
            .into_iter()
            .filter(|h| h.subscription_group() == subscription.as_ref())
            .collect();
        Self {
            subscription,
            handlers,
        }
    }

    /// Number of handlers in this group.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Names of the handlers in this group.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Runs every handler concurrently for `event` and waits for all of them.
    pub async fn dispatch(
        &self,
        event: &E,
        position: Option<u64>,
        event_type: &str,
    ) -> DispatchOutcome {
        let runs = self.handlers.iter().map(|handler| async move {
            let result = AssertUnwindSafe(handler.handle_event(event, position))
                .catch_unwind()
                .await;
            (handler, result)
        });

        let mut outcome = DispatchOutcome::default();
        for (handler, result) in join_all(runs).await {
            let (error, retryable) = match result {
                Ok(Ok(())) => {
                    outcome.handled += 1;
                    continue;
                }
                Ok(Err(e)) => (e.to_string(), e.is_retryable()),
                Err(panic) => (
                    format!("handler panicked: {}", panic_message(panic.as_ref())),
                    false,
                ),
            };

            tracing::error!(
                subscription = %self.subscription,
                handler = handler.name(),
                event_type,
                position = ?position,
                error = %error,
                "error handling event"
            );
            outcome.failures.push(HandlerFailure {
                handler: Arc::from(handler.name()),
                error,
                retryable,
            });
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Barrier;

    use super::*;
    use crate::error::{HandlerError, StoreError};
    use crate::handlers::HandlerFn;

    fn recorder(
        group: &'static str,
        name: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, u32, Option<u64>)>>>,
    ) -> HandlerRef<u32> {
        HandlerFn::arc(group, name, move |ev: u32, pos: Option<u64>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push((name, ev, pos));
                Ok::<_, HandlerError>(())
            }
        })
    }

    #[tokio::test]
    async fn only_matching_group_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventHandlerDispatcher::new(
            "orders",
            vec![
                recorder("orders", "a", seen.clone()),
                recorder("billing", "b", seen.clone()),
                recorder("orders", "c", seen.clone()),
            ],
        );
        assert_eq!(dispatcher.len(), 2);

        let outcome = dispatcher.dispatch(&7, Some(3), "Placed").await;
        assert_eq!(outcome.handled, 2);
        assert!(outcome.is_clean());

        let mut names: Vec<_> = seen.lock().unwrap().iter().map(|(n, _, _)| *n).collect();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
        assert!(seen.lock().unwrap().iter().all(|(_, ev, pos)| *ev == 7 && *pos == Some(3)));
    }

    #[tokio::test]
    async fn handlers_run_concurrently() {
        let barrier = Arc::new(Barrier::new(2));
        let make = |name: &'static str| -> HandlerRef<u32> {
            let barrier = barrier.clone();
            HandlerFn::arc("g", name, move |_ev: u32, _pos: Option<u64>| {
                let barrier = barrier.clone();
                async move {
                    barrier.wait().await;
                    Ok::<_, HandlerError>(())
                }
            })
        };
        let dispatcher = EventHandlerDispatcher::new("g", vec![make("x"), make("y")]);

        let outcome = tokio::time::timeout(Duration::from_secs(2), dispatcher.dispatch(&1, None, "T"))
            .await
            .expect("handlers were run sequentially");
        assert_eq!(outcome.handled, 2);
    }

    #[tokio::test]
    async fn failures_and_panics_are_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let failing: HandlerRef<u32> = HandlerFn::arc("g", "failing", |_ev: u32, _pos: Option<u64>| async {
            Err::<(), _>(HandlerError::fail("no stock"))
        });
        let panicking: HandlerRef<u32> =
            HandlerFn::arc("g", "panicking", |ev: u32, _pos: Option<u64>| async move {
                if ev > 0 {
                    panic!("kaboom");
                }
                Ok::<_, HandlerError>(())
            });
        let dispatcher = EventHandlerDispatcher::new(
            "g",
            vec![failing, recorder("g", "ok", seen.clone()), panicking],
        );

        let outcome = dispatcher.dispatch(&1, Some(1), "T").await;
        assert_eq!(outcome.handled, 1);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].handler.as_ref(), "failing");
        assert!(outcome.failures[0].error.contains("no stock"));
        assert_eq!(outcome.failures[1].handler.as_ref(), "panicking");
        assert!(outcome.failures[1].error.contains("kaboom"));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(outcome.retryable(), 0);
    }

    #[tokio::test]
    async fn store_failures_are_flagged_retryable() {
        let flaky: HandlerRef<u32> =
            HandlerFn::arc("g", "flaky", |_ev: u32, _pos: Option<u64>| async {
                Err::<(), _>(HandlerError::from(StoreError::Unavailable {
                    error: "timeout".into(),
                }))
            });
        let dispatcher = EventHandlerDispatcher::new("g", vec![flaky]);
        let outcome = dispatcher.dispatch(&1, None, "T").await;
        assert_eq!(outcome.retryable(), 1);
        assert!(outcome.failures[0].retryable);
    }

    #[tokio::test]
    async fn empty_group_dispatch_is_a_no_op() {
        let dispatcher = EventHandlerDispatcher::<u32>::new("nobody", Vec::new());
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(&1, None, "T").await, DispatchOutcome::default());
    }
}
