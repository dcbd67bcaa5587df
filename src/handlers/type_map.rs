use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::DecodeError;

type DecodeFn<E> = Box<dyn Fn(&[u8]) -> Result<E, serde_json::Error> + Send + Sync>;

/// Registry mapping event type names to JSON decoders producing `E`.
///
/// Unknown type names decode to `Ok(None)`: the engine skips those events but
/// still checkpoints them.
///
/// # Example
/// ```rust
/// use serde::Deserialize;
/// use subvisor::EventTypeMap;
///
/// #[derive(Deserialize)]
/// struct RoomBooked { room: String }
///
/// enum Booking { Booked(RoomBooked) }
///
/// let map = EventTypeMap::new().register("RoomBooked", Booking::Booked);
///
/// let ev = map.decode("RoomBooked", br#"{"room":"101"}"#).unwrap();
/// assert!(matches!(ev, Some(Booking::Booked(b)) if b.room == "101"));
/// assert!(map.decode("Unknown", b"{}").unwrap().is_none());
/// ```
pub struct EventTypeMap<E> {
    decoders: HashMap<String, DecodeFn<E>>,
}

impl<E> Default for EventTypeMap<E> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }
}

impl<E: 'static> EventTypeMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes payloads of `event_type` as `T` and wraps them with `wrap`.
    ///
    /// Registering the same name twice replaces the earlier decoder.
    pub fn register<T>(mut self, event_type: impl Into<String>, wrap: fn(T) -> E) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        self.decoders.insert(
            event_type.into(),
            Box::new(move |bytes| serde_json::from_slice::<T>(bytes).map(wrap)),
        );
        self
    }

    /// Decodes `data` using the decoder registered for `event_type`.
    pub fn decode(&self, event_type: &str, data: &[u8]) -> Result<Option<E>, DecodeError> {
        let Some(decoder) = self.decoders.get(event_type) else {
            return Ok(None);
        };
        decoder(data)
            .map(Some)
            .map_err(|source| DecodeError::Malformed {
                event_type: event_type.to_string(),
                source,
            })
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl<E> fmt::Debug for EventTypeMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("EventTypeMap").field("types", &names).finish()
    }
}
