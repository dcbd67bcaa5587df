//! # Event handlers and the fan-out dispatcher.
//!
//! Handlers are user code that reacts to decoded domain events. Each handler
//! declares a **subscription group**; an engine only receives the handlers whose
//! group equals its subscription name.
//!
//! ```text
//! ReceivedEvent ─► EventTypeMap::decode ─► E ─► EventHandlerDispatcher
//!                                                 ├─► handler A ─┐
//!                                                 ├─► handler B ─┼─ join_all
//!                                                 └─► handler C ─┘
//!                                                 → DispatchOutcome { handled, failures }
//! ```
//!
//! ## Contents
//! - [`EventHandler`], [`HandlerRef`] handler contract
//! - [`HandlerFn`] closure-backed handler
//! - [`EventHandlerDispatcher`], [`DispatchOutcome`], [`HandlerFailure`] concurrent fan-out
//! - [`EventTypeMap`] event type name → decoder registry

mod dispatcher;
mod handler;
mod handler_fn;
mod type_map;

pub use dispatcher::{DispatchOutcome, EventHandlerDispatcher, HandlerFailure};
pub use handler::{EventHandler, HandlerRef};
pub use handler_fn::HandlerFn;
pub use type_map::EventTypeMap;
