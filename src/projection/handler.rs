use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::handlers::EventHandler;
use crate::projection::document::{ProjectedDocument, UpdateOperation};
use crate::projection::store::DocumentStore;

/// Maps domain events onto operations against one document type.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use serde::{Deserialize, Serialize};
/// use subvisor::{ProjectedDocument, Projection, UpdateOperation};
///
/// #[derive(Serialize, Deserialize)]
/// struct Balance { #[serde(rename = "_id")] id: String, amount: i64 }
///
/// impl ProjectedDocument for Balance {
///     const COLLECTION: &'static str = "balances";
/// }
///
/// enum Ledger { Credited { account: String, amount: i64 }, Audited }
///
/// struct Balances;
///
/// #[async_trait]
/// impl Projection<Ledger> for Balances {
///     type Document = Balance;
///
///     async fn get_update(&self, event: &Ledger) -> Option<UpdateOperation<Balance>> {
///         match event {
///             Ledger::Credited { account, amount } => {
///                 Some(UpdateOperation::by_id(account.as_str(), |u| u.inc("amount", *amount)))
///             }
///             Ledger::Audited => None,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Projection<E>: Send + Sync + 'static
where
    E: Send + Sync + 'static,
{
    type Document: ProjectedDocument;

    /// Operation for `event`, or `None` if this projection ignores it.
    async fn get_update(&self, event: &E) -> Option<UpdateOperation<Self::Document>>;
}

/// Event handler applying a [`Projection`] to a [`DocumentStore`].
///
/// Each operation is applied as an upsert with the document's position field
/// set to the position of the projected event.
pub struct ProjectionHandler<P, E> {
    group: Cow<'static, str>,
    name: Cow<'static, str>,
    projection: P,
    store: Arc<dyn DocumentStore>,
    _event: PhantomData<fn(&E)>,
}

impl<P, E> ProjectionHandler<P, E>
where
    P: Projection<E>,
    E: Send + Sync + 'static,
{
    pub fn new(
        group: impl Into<Cow<'static, str>>,
        projection: P,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            group: group.into(),
            name: Cow::Borrowed(<P::Document as ProjectedDocument>::COLLECTION),
            projection,
            store,
            _event: PhantomData,
        }
    }

    /// Handler name used in logs; defaults to the collection name.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(
        group: impl Into<Cow<'static, str>>,
        projection: P,
        store: Arc<dyn DocumentStore>,
    ) -> Arc<Self> {
        Arc::new(Self::new(group, projection, store))
    }
}

#[async_trait]
impl<P, E> EventHandler<E> for ProjectionHandler<P, E>
where
    P: Projection<E>,
    E: Send + Sync + 'static,
{
    fn subscription_group(&self) -> &str {
        &self.group
    }

    async fn handle_event(&self, event: &E, position: Option<u64>) -> Result<(), HandlerError> {
        let Some(op) = self.projection.get_update(event).await else {
            tracing::debug!(projection = %self.name, position = ?position, "no update for event");
            return Ok(());
        };

        let collection = <P::Document as ProjectedDocument>::COLLECTION;
        let update = op
            .update
            .set_position(<P::Document as ProjectedDocument>::POSITION_FIELD, position);
        let outcome = self.store.upsert(collection, &op.filter, &update).await?;

        tracing::debug!(
            projection = %self.name,
            collection,
            position = ?position,
            outcome = ?outcome,
            "projected event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
