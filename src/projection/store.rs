use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::projection::document::{Filter, ProjectedDocument, Update};

/// What an upsert did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Document store backing read models.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Applies `update` to the first document of `collection` matching
    /// `filter`, inserting a new one when none matches.
    ///
    /// A new document starts from the equality clauses of the filter.
    async fn upsert(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpsertOutcome, StoreError>;

    /// First document of `collection` matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, StoreError>;
}

/// Typed [`DocumentStore::find_one`] for a projected document.
pub async fn find_document<T: ProjectedDocument>(
    store: &dyn DocumentStore,
    filter: &Filter,
) -> Result<Option<T>, StoreError> {
    match store.find_one(T::COLLECTION, filter).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

/// Process-local document store keeping JSON documents per collection.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    fail_writes: AtomicU32,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` upserts fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Snapshot of a collection, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn take_failure(&self) -> bool {
        self.fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpsertOutcome, StoreError> {
        if self.take_failure() {
            return Err(StoreError::Unavailable {
                error: format!("write to {collection} rejected"),
            });
        }

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_owned()).or_default();

        if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
            update.apply(doc, false);
            return Ok(UpsertOutcome::Updated);
        }

        let mut doc = Value::Object(Map::new());
        seed(filter).apply(&mut doc, true);
        update.apply(&mut doc, true);
        docs.push(doc);
        Ok(UpsertOutcome::Inserted)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }
}

/// Update setting every equality field of `filter`.
fn seed(filter: &Filter) -> Update {
    filter
        .clauses()
        .iter()
        .fold(Update::new(), |u, (field, value)| u.set(field.as_str(), value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        #[serde(rename = "_id")]
        id: String,
        hits: i64,
        position: Option<u64>,
    }

    impl ProjectedDocument for Counter {
        const COLLECTION: &'static str = "counters";
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let store = InMemoryDocumentStore::new();
        let filter = Filter::new().eq("_id", "c-1");
        let update = Update::new().inc("hits", 1).set("position", 4);

        assert_eq!(
            store.upsert("counters", &filter, &update).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert("counters", &filter, &update).await.unwrap(),
            UpsertOutcome::Updated
        );

        assert_eq!(store.count("counters").await, 1);
        assert_eq!(
            store.documents("counters").await,
            vec![json!({ "_id": "c-1", "hits": 2, "position": 4 })]
        );
    }

    #[tokio::test]
    async fn typed_lookup() {
        let store = InMemoryDocumentStore::new();
        let filter = Filter::new().eq("_id", "c-1");
        store
            .upsert(
                "counters",
                &filter,
                &Update::new().set("hits", 3).set("position", Value::Null),
            )
            .await
            .unwrap();

        let found = find_document::<Counter>(&store, &filter).await.unwrap();
        assert_eq!(
            found,
            Some(Counter {
                id: "c-1".into(),
                hits: 3,
                position: None,
            })
        );
        let missing = find_document::<Counter>(&store, &Filter::new().eq("_id", "c-2"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn malformed_document_is_a_serialization_error() {
        let store = InMemoryDocumentStore::new();
        let filter = Filter::new().eq("_id", "c-1");
        store
            .upsert("counters", &filter, &Update::new().set("hits", "many"))
            .await
            .unwrap();

        let err = find_document::<Counter>(&store, &filter).await.unwrap_err();
        assert_eq!(err.as_label(), "store_serialization");
    }

    #[tokio::test]
    async fn induced_write_failure() {
        let store = InMemoryDocumentStore::new();
        store.fail_next_writes(1);
        let filter = Filter::new().eq("_id", "c-1");

        let err = store
            .upsert("counters", &filter, &Update::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_eq!(store.count("counters").await, 0);

        store.upsert("counters", &filter, &Update::new()).await.unwrap();
        assert_eq!(store.count("counters").await, 1);
    }
}
