//! # Observers: pluggable consumers of lifecycle events.
//!
//! An engine publishes [`Event`](crate::Event)s on its [`Bus`](crate::Bus).
//! When observers are registered, [`EngineBuilder::build`](crate::EngineBuilder::build)
//! spawns a listener that forwards every event to an [`ObserverSet`].
//!
//! ```text
//! Bus ──► listener ──► ObserverSet::emit()
//!                        ├──► [queue] ─► LogWriter
//!                        ├──► [queue] ─► GapTracker
//!                        └──► [queue] ─► your observer
//! ```
//!
//! ## Contents
//! - [`Observe`] observer contract
//! - [`ObserverSet`] non-blocking fan-out with per-observer queues
//! - [`GapTracker`] latest measured gap per subscription
//! - [`LogWriter`] forwards events to `tracing`

mod gap;
mod log;
mod observe;
mod set;

pub use gap::GapTracker;
pub use log::LogWriter;
pub use observe::Observe;
pub use set::ObserverSet;
