//! # Projections: event handlers maintaining read-model documents.
//!
//! A [`Projection`] maps a decoded event to an [`UpdateOperation`] (or nothing).
//! [`ProjectionHandler`] turns it into an [`EventHandler`](crate::EventHandler)
//! that stamps the position and upserts into a [`DocumentStore`].
//!
//! ```text
//! E ─► Projection::get_update ─► None ─────────────────────► (debug log)
//!                              └► UpdateOperation { filter, update }
//!                                   update.set_position(POSITION_FIELD, position)
//!                                   DocumentStore::upsert(COLLECTION, filter, update)
//! ```
//!
//! Replaying an event rewrites the same document with the same position, so
//! set-style projections are idempotent under redelivery.

mod document;
mod handler;
mod store;

pub use document::{Filter, ProjectedDocument, Update, UpdateOperation};
pub use handler::{Projection, ProjectionHandler};
pub use store::{DocumentStore, InMemoryDocumentStore, UpsertOutcome, find_document};
