//! # Example: Cart projection
//!
//! Projects cart events from an in-memory log into a document store, survives
//! a dropped connection and resumes from a file checkpoint after a restart.
//!
//! ```text
//! InMemorySubscriber ──► SubscriptionEngine("carts") ──► ProjectionHandler<Carts>
//!                                │                              └► InMemoryDocumentStore
//!                                ├─► FileCheckpointStore (<tmp>/subvisor-demo)
//!                                └─► Bus ──► LogWriter, GapTracker
//! ```
//!
//! Run with: `cargo run --example projection`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use subvisor::{
    BackoffPolicy, DropReason, EventTypeMap, FileCheckpointStore, Filter, GapTracker,
    InMemoryDocumentStore, InMemorySubscriber, LogWriter, ProjectedDocument, Projection,
    ProjectionHandler, SubscriptionConfig, SubscriptionEngine, UpdateOperation, find_document,
};

#[derive(Clone, Debug, Deserialize)]
struct ItemAdded {
    cart: String,
    sku: String,
    price: i64,
}

#[derive(Clone, Debug, Deserialize)]
struct CheckedOut {
    cart: String,
}

#[derive(Clone, Debug)]
enum CartEvent {
    ItemAdded(ItemAdded),
    CheckedOut(CheckedOut),
}

#[derive(Debug, Serialize, Deserialize)]
struct CartView {
    #[serde(rename = "_id")]
    id: String,
    items: Vec<String>,
    total: i64,
    checked_out: bool,
    position: Option<u64>,
}

impl ProjectedDocument for CartView {
    const COLLECTION: &'static str = "carts";
}

struct Carts;

#[async_trait]
impl Projection<CartEvent> for Carts {
    type Document = CartView;

    async fn get_update(&self, event: &CartEvent) -> Option<UpdateOperation<CartView>> {
        match event {
            CartEvent::ItemAdded(e) => Some(UpdateOperation::by_id(e.cart.as_str(), |u| {
                u.push("items", e.sku.as_str())
                    .inc("total", e.price)
                    .set_on_insert("checked_out", false)
            })),
            CartEvent::CheckedOut(e) => Some(UpdateOperation::by_id(e.cart.as_str(), |u| {
                u.set("checked_out", true)
            })),
        }
    }
}

fn engine(
    log: Arc<InMemorySubscriber>,
    docs: Arc<InMemoryDocumentStore>,
    gaps: Arc<GapTracker>,
    dir: &std::path::Path,
) -> SubscriptionEngine<CartEvent> {
    let cfg = SubscriptionConfig::new("carts")
        .with_retry(BackoffPolicy::constant(Duration::from_millis(200)))
        .with_gap_measurement(Duration::from_millis(100));

    SubscriptionEngine::builder(cfg, log)
        .with_checkpoint_store(Arc::new(FileCheckpointStore::new(dir)))
        .with_event_types(
            EventTypeMap::new()
                .register("ItemAdded", CartEvent::ItemAdded)
                .register("CheckedOut", CartEvent::CheckedOut),
        )
        .with_handler(ProjectionHandler::<_, CartEvent>::arc("carts", Carts, docs))
        .with_observer(Arc::new(LogWriter))
        .with_observer(gaps)
        .build()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    let dir = std::env::temp_dir().join("subvisor-demo");
    let _ = tokio::fs::remove_dir_all(&dir).await;

    let log = Arc::new(InMemorySubscriber::new());
    let docs = Arc::new(InMemoryDocumentStore::new());
    let gaps = Arc::new(GapTracker::new());

    let first = engine(log.clone(), docs.clone(), gaps.clone(), &dir);
    first.start().await?;

    log.append("cart-1", "ItemAdded", &json!({ "cart": "cart-1", "sku": "tea", "price": 4 }))
        .await;
    log.append("cart-1", "ItemAdded", &json!({ "cart": "cart-1", "sku": "mug", "price": 9 }))
        .await;

    // The backend loses the connection; the engine resubscribes from position 2
    // once the backend accepts subscriptions again.
    first.wait_for(|s| s.last_processed_position == Some(2)).await;
    log.fail_next_subscribes(2);
    log.drop_active(DropReason::ConnectionLost, Some("broker restarted".into()))
        .await;
    println!("[demo] health while dropped: {}", first.check_health());
    first.wait_for(|s| !s.dropped).await;
    println!("[demo] health after recovery: {}", first.check_health());

    log.append("cart-2", "ItemAdded", &json!({ "cart": "cart-2", "sku": "pot", "price": 25 }))
        .await;
    first.wait_for(|s| s.last_processed_position == Some(3)).await;
    first.stop().await;

    // A new process picks up after the stored checkpoint.
    log.append("cart-1", "CheckedOut", &json!({ "cart": "cart-1" })).await;
    let second = engine(log.clone(), docs.clone(), gaps.clone(), &dir);
    second.start().await?;
    second.wait_for(|s| s.last_processed_position == Some(4)).await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    println!("[demo] gaps: {:?}", gaps.snapshot().await);
    second.stop().await;

    let cart = find_document::<CartView>(&*docs, &Filter::new().eq("_id", "cart-1")).await?;
    println!("[demo] cart-1: {cart:?}");
    println!("[demo] carts projected: {}", docs.count("carts").await);
    Ok(())
}
