//! # Normalized envelope for one delivered message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

/// One message as delivered by a backend, normalized by its adapter.
///
/// Immutable once built; the engine consumes it and discards it after handling.
///
/// ## Example
/// ```rust
/// use subvisor::ReceivedEvent;
///
/// let ev = ReceivedEvent::new("evt-1", "RoomBooked", 17, br#"{"room":"101"}"#.to_vec())
///     .with_stream("booking-42", 3)
///     .with_metadata("correlation-id", "abc");
///
/// assert_eq!(ev.global_position, 17);
/// assert_eq!(ev.stream.as_ref(), "booking-42");
/// assert_eq!(ev.metadata.get("correlation-id").map(String::as_str), Some("abc"));
/// ```
#[derive(Clone, Debug)]
pub struct ReceivedEvent {
    /// Backend message id.
    pub id: Arc<str>,
    /// Stream (or topic) the message was read from.
    pub stream: Arc<str>,
    /// Position in the global log; used for checkpoints.
    pub global_position: u64,
    /// Position inside `stream`.
    pub stream_position: u64,
    /// Event number inside its original stream.
    pub sequence: u64,
    /// When the message was written.
    pub created_at: SystemTime,
    /// Type name used to pick a decoder.
    pub event_type: Arc<str>,
    /// Payload content type.
    pub content_type: Arc<str>,
    /// Encoded payload.
    pub data: Arc<[u8]>,
    /// Backend attributes / headers.
    pub metadata: HashMap<String, String>,
}

impl ReceivedEvent {
    /// Builds an envelope at `global_position` with JSON content type.
    ///
    /// Stream defaults to empty; stream position and sequence default to the
    /// global position.
    pub fn new(
        id: impl Into<Arc<str>>,
        event_type: impl Into<Arc<str>>,
        global_position: u64,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            id: id.into(),
            stream: Arc::from(""),
            global_position,
            stream_position: global_position,
            sequence: global_position,
            created_at: SystemTime::now(),
            event_type: event_type.into(),
            content_type: Arc::from("application/json"),
            data: data.into(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the source stream and the position inside it.
    pub fn with_stream(mut self, stream: impl Into<Arc<str>>, stream_position: u64) -> Self {
        self.stream = stream.into();
        self.stream_position = stream_position;
        self.sequence = stream_position;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<Arc<str>>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_created_at(mut self, at: SystemTime) -> Self {
        self.created_at = at;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
