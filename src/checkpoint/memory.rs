use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::StoreError;

/// Process-local checkpoint store.
///
/// Can be told to fail upcoming writes, which is how the checkpoint failure
/// policies are exercised.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    positions: RwLock<HashMap<String, Option<u64>>>,
    fail_writes: AtomicU32,
    writes: AtomicU64,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one checkpoint.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            positions: RwLock::new(HashMap::from([(
                checkpoint.subscription,
                checkpoint.position,
            )])),
            ..Self::default()
        }
    }

    /// Makes the next `n` writes fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get_last_checkpoint(&self, subscription: &str) -> Result<Checkpoint, StoreError> {
        let position = self
            .positions
            .read()
            .await
            .get(subscription)
            .copied()
            .flatten();
        Ok(Checkpoint::new(subscription, position))
    }

    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<Checkpoint, StoreError> {
        let induced = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if induced {
            return Err(StoreError::Unavailable {
                error: "induced write failure".into(),
            });
        }

        self.positions
            .write()
            .await
            .insert(checkpoint.subscription.clone(), checkpoint.position);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(checkpoint.clone())
    }
}
