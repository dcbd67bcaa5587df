use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use subvisor::{
    CheckpointStore, DropReason, EventTypeMap, FileCheckpointStore, Filter, HandlerError,
    HandlerFn, HandlerRef, HealthStatus, InMemoryCheckpointStore, InMemoryDocumentStore,
    InMemorySubscriber, ProjectedDocument, Projection, ProjectionHandler, SubscriptionConfig,
    SubscriptionEngine, UpdateOperation, find_document,
};

#[derive(Clone, Debug, Deserialize)]
struct Deposited {
    account: String,
    amount: i64,
}

#[derive(Clone, Debug, Deserialize)]
struct Closed {
    account: String,
}

#[derive(Clone, Debug)]
enum Bank {
    Deposited(Deposited),
    Closed(Closed),
}

fn bank_types() -> EventTypeMap<Bank> {
    EventTypeMap::new()
        .register("Deposited", Bank::Deposited)
        .register("Closed", Bank::Closed)
}

fn counting(group: &'static str, calls: Arc<Mutex<Vec<Option<u64>>>>) -> HandlerRef<Bank> {
    HandlerFn::arc(group, group, move |_ev: Bank, pos: Option<u64>| {
        let calls = calls.clone();
        async move {
            calls.lock().unwrap().push(pos);
            Ok::<_, HandlerError>(())
        }
    })
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

#[tokio::test]
async fn fresh_subscription_only_feeds_its_group() {
    let log = Arc::new(InMemorySubscriber::new());
    let store = Arc::new(InMemoryCheckpointStore::new());
    let h1 = Arc::new(Mutex::new(Vec::new()));
    let h2 = Arc::new(Mutex::new(Vec::new()));

    let engine = SubscriptionEngine::builder(SubscriptionConfig::new("accounts"), log.clone())
        .with_checkpoint_store(store.clone())
        .with_event_types(bank_types())
        .with_handlers([counting("accounts", h1.clone()), counting("audit", h2.clone())])
        .build();

    engine.start().await.unwrap();
    for amount in [10, 20, 30] {
        log.append(
            "account-1",
            "Deposited",
            &json!({ "account": "account-1", "amount": amount }),
        )
        .await;
    }
    within(engine.wait_for(|s| s.last_processed_position == Some(3))).await;
    engine.stop().await;

    assert_eq!(*h1.lock().unwrap(), vec![Some(1), Some(2), Some(3)]);
    assert!(h2.lock().unwrap().is_empty());
    let checkpoint = store.get_last_checkpoint("accounts").await.unwrap();
    assert_eq!(checkpoint.position, Some(3));
}

#[tokio::test(start_paused = true)]
async fn three_failed_subscribes_then_recovery() {
    let log = Arc::new(InMemorySubscriber::new());
    let engine = SubscriptionEngine::<Bank>::builder(SubscriptionConfig::new("accounts"), log.clone())
        .with_event_types(bank_types())
        .build();
    engine.start().await.unwrap();
    assert_eq!(engine.check_health(), HealthStatus::Healthy);

    let mut health = Vec::new();
    let mut states = engine.watch_state();
    log.fail_next_subscribes(3);
    let dropped_at = tokio::time::Instant::now();
    log.drop_active(DropReason::ConnectionLost, Some("socket closed".into()))
        .await;

    loop {
        health.push(engine.check_health().is_healthy());
        if !states.borrow_and_update().dropped {
            break;
        }
        states.changed().await.unwrap();
    }

    // One initial subscribe plus four resubscribe attempts.
    assert_eq!(log.subscribe_attempts(), 5);
    // Three one-second pauses between the four attempts.
    let elapsed = dropped_at.elapsed();
    assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3100));
    assert_eq!(health.last(), Some(&true));
    assert!(health[..health.len() - 1].iter().all(|ok| !ok));
    engine.stop().await;
}

#[tokio::test]
async fn restart_resumes_from_file_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(InMemorySubscriber::new());
    let calls = Arc::new(Mutex::new(Vec::new()));

    let build = || {
        SubscriptionEngine::builder(SubscriptionConfig::new("accounts"), log.clone())
            .with_checkpoint_store(Arc::new(FileCheckpointStore::new(dir.path())))
            .with_event_types(bank_types())
            .with_handler(counting("accounts", calls.clone()))
            .build()
    };

    for amount in [1, 2] {
        log.append("a", "Deposited", &json!({ "account": "a", "amount": amount }))
            .await;
    }
    let first = build();
    first.start().await.unwrap();
    within(first.wait_for(|s| s.last_processed_position == Some(2))).await;
    first.stop().await;

    log.append("a", "Closed", &json!({ "account": "a" })).await;
    let second = build();
    second.start().await.unwrap();
    within(second.wait_for(|s| s.last_processed_position == Some(3))).await;
    second.stop().await;

    assert_eq!(*calls.lock().unwrap(), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(log.seen_checkpoints().await[1].position, Some(2));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct AccountView {
    #[serde(rename = "_id")]
    id: String,
    balance: i64,
    open: bool,
    position: Option<u64>,
}

impl ProjectedDocument for AccountView {
    const COLLECTION: &'static str = "accounts";
}

struct Accounts;

#[async_trait]
impl Projection<Bank> for Accounts {
    type Document = AccountView;

    async fn get_update(&self, event: &Bank) -> Option<UpdateOperation<AccountView>> {
        match event {
            Bank::Deposited(d) => Some(UpdateOperation::by_id(d.account.as_str(), |u| {
                u.inc("balance", d.amount).set_on_insert("open", true)
            })),
            Bank::Closed(c) => Some(UpdateOperation::by_id(c.account.as_str(), |u| {
                u.set("open", false)
            })),
        }
    }
}

#[tokio::test]
async fn projection_maintains_read_model() {
    let log = Arc::new(InMemorySubscriber::new());
    let docs = Arc::new(InMemoryDocumentStore::new());

    let engine = SubscriptionEngine::builder(SubscriptionConfig::new("accounts"), log.clone())
        .with_event_types(bank_types())
        .with_handler(ProjectionHandler::<_, Bank>::arc("accounts", Accounts, docs.clone()))
        .build();
    engine.start().await.unwrap();

    log.append("a", "Deposited", &json!({ "account": "a", "amount": 5 }))
        .await;
    log.append("b", "Deposited", &json!({ "account": "b", "amount": 1 }))
        .await;
    log.append("a", "Deposited", &json!({ "account": "a", "amount": 7 }))
        .await;
    log.append("a", "Closed", &json!({ "account": "a" })).await;
    within(engine.wait_for(|s| s.last_processed_position == Some(4))).await;
    engine.stop().await;

    let a = find_document::<AccountView>(&*docs, &Filter::new().eq("_id", "a"))
        .await
        .unwrap();
    assert_eq!(
        a,
        Some(AccountView {
            id: "a".into(),
            balance: 12,
            open: false,
            position: Some(4),
        })
    );
    assert_eq!(docs.count("accounts").await, 2);
}
