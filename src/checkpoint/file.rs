use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::StoreError;

/// Checkpoint store keeping one JSON file per subscription in a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a crash
/// never leaves a half-written checkpoint. A file that fails to parse, or
/// that records another subscription, is treated as missing and the
/// subscription replays from the beginning.
#[derive(Clone, Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Store rooted at `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the checkpoint for `subscription`.
    ///
    /// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, so distinct names
    /// never share a file.
    pub fn path_for(&self, subscription: &str) -> PathBuf {
        let mut file = String::with_capacity(subscription.len());
        for b in subscription.bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
                file.push(char::from(b));
            } else {
                file.push_str(&format!("%{b:02X}"));
            }
        }
        self.dir.join(format!("{file}.checkpoint.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get_last_checkpoint(&self, subscription: &str) -> Result<Checkpoint, StoreError> {
        let path = self.path_for(subscription);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Checkpoint>(&bytes) {
                Ok(checkpoint) if checkpoint.subscription == subscription => Ok(checkpoint),
                Ok(checkpoint) => {
                    tracing::warn!(
                        path = %path.display(),
                        expected = subscription,
                        found = %checkpoint.subscription,
                        "checkpoint file belongs to another subscription, replaying from the beginning"
                    );
                    Ok(Checkpoint::empty(subscription))
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupt checkpoint file, replaying from the beginning"
                    );
                    Ok(Checkpoint::empty(subscription))
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Checkpoint::empty(subscription)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> Result<Checkpoint, StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&checkpoint.subscription);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(checkpoint)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(checkpoint.clone())
    }
}
