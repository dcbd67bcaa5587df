//! Error types used by the subscription engine, its stores and handlers.
//!
//! This module defines the error enums surfaced by the crate:
//!
//! - [`SubscriptionError`]: errors raised by the engine lifecycle itself.
//! - [`SubscribeError`]: errors raised by a backend while opening a subscription.
//! - [`StoreError`]: errors raised by checkpoint and document stores.
//! - [`HandlerError`]: errors raised by individual event handlers.
//! - [`DecodeError`]: payload that could not be turned into a domain event.
//!
//! Every type provides `as_label` (stable snake_case for logs/metrics).

use thiserror::Error;

/// # Errors produced by the subscription engine.
///
/// Returned from [`SubscriptionEngine::start`](crate::SubscriptionEngine::start)
/// and from the delivery path when the checkpoint policy propagates a failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// The checkpoint for this subscription could not be read.
    #[error("failed to load checkpoint for '{subscription}': {source}")]
    CheckpointLoad {
        /// Subscription name.
        subscription: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A checkpoint could not be written after handling an event.
    #[error("failed to store checkpoint {position:?} for '{subscription}': {source}")]
    CheckpointStore {
        /// Subscription name.
        subscription: String,
        /// Position that failed to persist.
        position: Option<u64>,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The backend refused or failed to open the subscription.
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    /// A handler failed with a retryable error on an acknowledged backend;
    /// the message is negatively acknowledged for redelivery.
    #[error("{failed} handler(s) of '{subscription}' need redelivery of {position:?}")]
    HandlerRetry {
        /// Subscription name.
        subscription: String,
        /// Position of the message.
        position: Option<u64>,
        /// Number of handlers that failed with a retryable error.
        failed: usize,
    },

    /// `start()` was called on an engine that is already running.
    #[error("subscription '{subscription}' is already running")]
    AlreadyRunning {
        /// Subscription name.
        subscription: String,
    },

    /// `stop()` was called while `start()` was still opening the subscription.
    /// The engine is stopped and the half-opened subscription disposed.
    #[error("subscription '{subscription}' was stopped while starting")]
    Interrupted {
        /// Subscription name.
        subscription: String,
    },
}

impl SubscriptionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use subvisor::{SubscriptionError, SubscribeError};
    ///
    /// let err = SubscriptionError::from(SubscribeError::Unavailable { reason: "down".into() });
    /// assert_eq!(err.as_label(), "subscription_subscribe_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriptionError::CheckpointLoad { .. } => "subscription_checkpoint_load_failed",
            SubscriptionError::CheckpointStore { .. } => "subscription_checkpoint_store_failed",
            SubscriptionError::Subscribe(_) => "subscription_subscribe_failed",
            SubscriptionError::HandlerRetry { .. } => "subscription_handler_retry",
            SubscriptionError::AlreadyRunning { .. } => "subscription_already_running",
            SubscriptionError::Interrupted { .. } => "subscription_interrupted",
        }
    }
}

/// # Errors produced by a backend while subscribing.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum SubscribeError {
    /// The backend could not be reached; retrying may succeed.
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Backend-specific details.
        reason: String,
    },

    /// The backend rejected the request (bad position, missing permissions, ...).
    #[error("subscription rejected: {reason}")]
    Rejected {
        /// Backend-specific details.
        reason: String,
    },
}

impl SubscribeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscribeError::Unavailable { .. } => "subscribe_unavailable",
            SubscribeError::Rejected { .. } => "subscribe_rejected",
        }
    }
}

/// # Errors produced by checkpoint and document stores.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {error}")]
    Unavailable {
        /// Store-specific details.
        error: String,
    },

    /// A record could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use subvisor::StoreError;
    ///
    /// let err = StoreError::Unavailable { error: "timeout".into() };
    /// assert_eq!(err.as_label(), "store_unavailable");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "store_unavailable",
            StoreError::Serialization(_) => "store_serialization",
            StoreError::Io(_) => "store_io",
        }
    }
}

/// # Errors produced by event handlers.
///
/// Handler errors never abort a dispatch: they are logged, reported on the bus
/// and the checkpoint advances anyway.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler failed while processing the event.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A store used by the handler failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Store(_) => "handler_store_failed",
        }
    }

    /// Indicates whether redelivering the same event could succeed.
    ///
    /// Returns `true` for store failures, `false` for handler logic failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Store(_))
    }
}

/// # Errors produced while decoding a delivered payload.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload did not match the shape registered for its event type.
    #[error("malformed '{event_type}' payload: {source}")]
    Malformed {
        /// Event type name carried by the envelope.
        event_type: String,
        /// Underlying parser failure.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DecodeError::Malformed { .. } => "decode_malformed",
        }
    }
}
