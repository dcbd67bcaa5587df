//! # Checkpoints: durable resume positions.
//!
//! A [`Checkpoint`] records the last processed position of one named
//! subscription. The engine loads it on start, passes it to every subscribe
//! attempt and writes it after each handled event (ordered backends only).
//!
//! ## Contents
//! - [`Checkpoint`] name + optional position (`None` = from the beginning)
//! - [`CheckpointStore`] persistence capability
//! - [`InMemoryCheckpointStore`] process-local store with induced failures
//! - [`FileCheckpointStore`] one JSON file per subscription, atomic writes
//!
//! ## Rules
//! - Loading a name that was never stored yields `position: None`, not an error.
//! - Stores are last-writer-wins per name.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Resume position of one named subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique subscription name.
    pub subscription: String,
    /// Last processed position; `None` means start from the beginning.
    pub position: Option<u64>,
}

impl Checkpoint {
    pub fn new(subscription: impl Into<String>, position: Option<u64>) -> Self {
        Self {
            subscription: subscription.into(),
            position,
        }
    }

    /// Checkpoint that replays everything.
    pub fn empty(subscription: impl Into<String>) -> Self {
        Self::new(subscription, None)
    }
}

/// Persistence for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync + 'static {
    /// Returns the stored checkpoint, or an empty one if none exists.
    async fn get_last_checkpoint(&self, subscription: &str) -> Result<Checkpoint, StoreError>;

    /// Persists `checkpoint` and returns it.
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<Checkpoint, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_checkpoint_has_no_position() {
        let cp = Checkpoint::empty("orders");
        assert_eq!(cp.subscription, "orders");
        assert_eq!(cp.position, None);
    }

    #[test]
    fn serializes_missing_position_as_null() {
        let json = serde_json::to_string(&Checkpoint::empty("a")).unwrap();
        assert_eq!(json, r#"{"subscription":"a","position":null}"#);
    }
}
