//! Engine core: lifecycle, delivery, recovery and gap measurement.
//!
//! The public API from this module is [`SubscriptionEngine`] (built through
//! [`EngineBuilder`]), its configuration and its health/state types.
//!
//! Internal modules:
//! - `engine`: start / stop / health / state access;
//! - `delivery`: decode, dispatch and checkpoint one delivered message;
//! - `resubscribe`: drop handling and the unbounded resubscribe loop;
//! - `gap`: background gap measurement task.

mod builder;
mod config;
mod delivery;
mod engine;
mod gap;
mod health;
mod resubscribe;
mod state;


pub use builder::EngineBuilder;
pub use config::SubscriptionConfig;
pub use engine::SubscriptionEngine;
pub use health::{HealthCheck, HealthStatus, unhealthy_components};
pub use state::{SubscriptionPhase, SubscriptionState};
