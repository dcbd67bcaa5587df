//! Retry and failure policies.
//!
//! This module groups the knobs that control **how long** the engine waits
//! between resubscribe attempts and **what happens** when a checkpoint cannot
//! be written.
//!
//! ## Contents
//! - [`BackoffPolicy`]    how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]     randomization strategy to avoid reconnect storms
//! - [`CheckpointPolicy`] reaction to checkpoint-store failures in the delivery path
//!
//! ## Quick wiring
//! ```text
//! SubscriptionConfig { retry: BackoffPolicy, checkpoint_policy: CheckpointPolicy, .. }
//!      ├─► core::resubscribe uses retry.next(attempt) between failed subscribe attempts
//!      └─► core::delivery uses checkpoint_policy after every handled event
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 1s, no jitter.
//! - `CheckpointPolicy::Propagate` → the error goes back to the backend adapter.

mod backoff;
mod checkpoint;
mod jitter;

pub use backoff::BackoffPolicy;
pub use checkpoint::CheckpointPolicy;
pub use jitter::JitterPolicy;
