//! # In-process ordered log implementing [`Subscriber`].
//!
//! [`InMemorySubscriber`] keeps an append-only list of [`ReceivedEvent`]s with
//! global positions starting at 1. Each subscription runs a read task that
//! delivers everything after the checkpoint, then follows new appends.
//!
//! Besides being a usable embedded source, it exposes knobs to drive the
//! engine through its failure paths:
//! - [`fail_next_subscribes`](InMemorySubscriber::fail_next_subscribes) makes
//!   upcoming subscribe attempts fail
//! - [`drop_active`](InMemorySubscriber::drop_active) simulates connection loss
//! - [`pause`](InMemorySubscriber::pause) / [`resume`](InMemorySubscriber::resume)
//!   hold delivery back (lets a gap build up)
//! - [`acknowledged`](InMemorySubscriber::acknowledged) switches to queue
//!   semantics and records acks / nacks

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::Checkpoint;
use crate::error::SubscribeError;
use crate::source::{
    DeliveryMode, DropReason, EventSink, ReceivedEvent, Subscriber, SubscriptionHandle,
};

/// Live subscription that can be killed from outside.
struct Active {
    kill: CancellationToken,
    sink: EventSink,
}

struct Shared {
    log: RwLock<Vec<ReceivedEvent>>,
    head: watch::Sender<u64>,
    open: watch::Sender<bool>,
    fail_next: AtomicU32,
    attempts: AtomicU32,
    seen: Mutex<Vec<Checkpoint>>,
    active: Mutex<Option<Active>>,
    acked: Mutex<Vec<u64>>,
    nacked: Mutex<Vec<u64>>,
}

/// Ordered in-memory event log.
///
/// Cheap to clone; clones share the same log.
#[derive(Clone)]
pub struct InMemorySubscriber {
    shared: Arc<Shared>,
    mode: DeliveryMode,
    control_prefix: Option<Arc<str>>,
}

impl Default for InMemorySubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySubscriber {
    /// Ordered log; the engine checkpoints after every event.
    pub fn new() -> Self {
        Self::with_mode(DeliveryMode::Ordered)
    }

    /// Queue semantics: delivery results are recorded as acks / nacks.
    pub fn acknowledged() -> Self {
        Self::with_mode(DeliveryMode::Acknowledged)
    }

    fn with_mode(mode: DeliveryMode) -> Self {
        let (head, _) = watch::channel(0);
        let (open, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                log: RwLock::new(Vec::new()),
                head,
                open,
                fail_next: AtomicU32::new(0),
                attempts: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
                active: Mutex::new(None),
                acked: Mutex::new(Vec::new()),
                nacked: Mutex::new(Vec::new()),
            }),
            mode,
            control_prefix: None,
        }
    }

    /// Events whose type starts with `prefix` are reported as control events.
    pub fn with_control_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.control_prefix = Some(prefix.into());
        self
    }

    /// Appends a JSON event to `stream` and returns its global position.
    pub async fn append(&self, stream: &str, event_type: &str, data: &serde_json::Value) -> u64 {
        self.append_bytes(stream, event_type, data.to_string().into_bytes())
            .await
    }

    /// Appends a raw payload to `stream` and returns its global position.
    pub async fn append_bytes(&self, stream: &str, event_type: &str, data: Vec<u8>) -> u64 {
        let mut log = self.shared.log.write().await;
        let position = log.len() as u64 + 1;
        let stream_position = log
            .iter()
            .filter(|e| e.stream.as_ref() == stream)
            .count() as u64
            + 1;
        log.push(
            ReceivedEvent::new(format!("{stream}-{position}"), event_type, position, data)
                .with_stream(stream, stream_position),
        );
        drop(log);

        self.shared.head.send_replace(position);
        position
    }

    /// Number of events in the log.
    pub async fn len(&self) -> usize {
        self.shared.log.read().await.len()
    }

    /// True if nothing was appended yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Makes the next `n` subscribe attempts fail with
    /// [`SubscribeError::Unavailable`].
    pub fn fail_next_subscribes(&self, n: u32) {
        self.shared.fail_next.store(n, Ordering::SeqCst);
    }

    /// Total subscribe attempts, failed ones included.
    pub fn subscribe_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Checkpoints passed to every subscribe attempt, in order.
    pub async fn seen_checkpoints(&self) -> Vec<Checkpoint> {
        self.shared.seen.lock().await.clone()
    }

    /// Kills the most recent subscription and reports `reason` through its sink.
    ///
    /// Returns `false` if nothing was subscribed.
    pub async fn drop_active(&self, reason: DropReason, error: Option<String>) -> bool {
        let Some(active) = self.shared.active.lock().await.take() else {
            return false;
        };
        active.kill.cancel();
        active.sink.dropped(reason, error);
        true
    }

    /// Holds delivery until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.shared.open.send_replace(false);
    }

    pub fn resume(&self) {
        self.shared.open.send_replace(true);
    }

    /// Positions acknowledged so far (acknowledged mode only).
    pub async fn acked(&self) -> Vec<u64> {
        self.shared.acked.lock().await.clone()
    }

    /// Positions negatively acknowledged so far (acknowledged mode only).
    pub async fn nacked(&self) -> Vec<u64> {
        self.shared.nacked.lock().await.clone()
    }
}

#[async_trait]
impl Subscriber for InMemorySubscriber {
    async fn subscribe(
        &self,
        checkpoint: Checkpoint,
        sink: EventSink,
    ) -> Result<SubscriptionHandle, SubscribeError> {
        let shared = &self.shared;
        shared.attempts.fetch_add(1, Ordering::SeqCst);
        shared.seen.lock().await.push(checkpoint.clone());

        let induced = shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if induced {
            return Err(SubscribeError::Unavailable {
                reason: "induced subscribe failure".into(),
            });
        }

        let cancel = CancellationToken::new();
        let kill = CancellationToken::new();
        *shared.active.lock().await = Some(Active {
            kill: kill.clone(),
            sink: sink.clone(),
        });

        let task = tokio::spawn(pump(
            Arc::clone(shared),
            self.mode,
            checkpoint.position.unwrap_or(0),
            sink,
            cancel.clone(),
            kill,
        ));
        Ok(SubscriptionHandle::new(cancel).with_task(task))
    }

    async fn head_position(&self) -> Result<Option<u64>, SubscribeError> {
        let len = self.shared.log.read().await.len() as u64;
        Ok((len > 0).then_some(len))
    }

    fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    fn is_control_event(&self, event: &ReceivedEvent) -> bool {
        self.control_prefix
            .as_deref()
            .is_some_and(|prefix| event.event_type.starts_with(prefix))
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// Read loop of one subscription: deliver after `cursor`, then follow the head.
async fn pump(
    shared: Arc<Shared>,
    mode: DeliveryMode,
    mut cursor: u64,
    sink: EventSink,
    cancel: CancellationToken,
    kill: CancellationToken,
) {
    let mut head = shared.head.subscribe();
    let mut open = shared.open.subscribe();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sink.dropped(DropReason::Disposed, None);
                return;
            }
            _ = kill.cancelled() => return,
            ready = wait_ready(&mut head, &mut open, cursor) => {
                if !ready {
                    return;
                }
            }
        }

        let batch: Vec<ReceivedEvent> = {
            let log = shared.log.read().await;
            log.get(cursor as usize..)
                .map(<[ReceivedEvent]>::to_vec)
                .unwrap_or_default()
        };

        for event in batch {
            if cancel.is_cancelled() || kill.is_cancelled() || !*open.borrow() {
                break;
            }
            let position = event.global_position;
            let result = sink.deliver(event).await;
            match mode {
                DeliveryMode::Ordered => {
                    if let Err(e) = result {
                        sink.dropped(DropReason::SubscriberError, Some(e.to_string()));
                        return;
                    }
                }
                DeliveryMode::Acknowledged => match result {
                    Ok(()) => shared.acked.lock().await.push(position),
                    Err(_) => shared.nacked.lock().await.push(position),
                },
            }
            cursor = position;
        }
    }
}

/// Resolves once delivery is open and the head moved past `cursor`.
async fn wait_ready(
    head: &mut watch::Receiver<u64>,
    open: &mut watch::Receiver<bool>,
    cursor: u64,
) -> bool {
    if open.wait_for(|o| *o).await.is_err() {
        return false;
    }
    head.wait_for(|h| *h > cursor).await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::source::sink::testing::RecordingTarget;

    async fn eventually(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    fn positions(target: &RecordingTarget) -> Vec<u64> {
        target
            .delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| *p)
            .collect()
    }

    #[tokio::test]
    async fn delivers_after_checkpoint_then_follows_appends() {
        let log = InMemorySubscriber::new();
        for n in 0..3 {
            log.append("s", "Tick", &json!({ "n": n })).await;
        }

        let target = Arc::new(RecordingTarget::default());
        let handle = log
            .subscribe(
                Checkpoint::new("sub", Some(1)),
                EventSink::new(1, target.clone()),
            )
            .await
            .unwrap();

        eventually(|| positions(&target) == vec![2, 3]).await;
        log.append("s", "Tick", &json!({ "n": 3 })).await;
        eventually(|| positions(&target) == vec![2, 3, 4]).await;

        handle.dispose().await;
        let drops = target.drops.lock().unwrap();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].1, DropReason::Disposed);
    }

    #[tokio::test]
    async fn induced_failures_are_consumed_one_per_attempt() {
        let log = InMemorySubscriber::new();
        log.fail_next_subscribes(2);
        let target = Arc::new(RecordingTarget::default());

        for _ in 0..2 {
            let err = log
                .subscribe(Checkpoint::new("sub", None), EventSink::new(1, target.clone()))
                .await
                .unwrap_err();
            assert!(matches!(err, SubscribeError::Unavailable { .. }));
        }
        let handle = log
            .subscribe(Checkpoint::new("sub", None), EventSink::new(1, target.clone()))
            .await
            .unwrap();

        assert_eq!(log.subscribe_attempts(), 3);
        assert_eq!(log.seen_checkpoints().await.len(), 3);
        handle.dispose().await;
    }

    #[tokio::test]
    async fn drop_active_reports_reason_without_disposed() {
        let log = InMemorySubscriber::new();
        let target = Arc::new(RecordingTarget::default());
        let handle = log
            .subscribe(Checkpoint::new("sub", None), EventSink::new(4, target.clone()))
            .await
            .unwrap();

        assert!(
            log.drop_active(DropReason::ConnectionLost, Some("reset".into()))
                .await
        );
        assert!(!log.drop_active(DropReason::ConnectionLost, None).await);
        handle.dispose().await;

        let drops = target.drops.lock().unwrap();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0], (4, DropReason::ConnectionLost, Some("reset".into())));
    }

    #[tokio::test]
    async fn paused_log_holds_delivery() {
        let log = InMemorySubscriber::new();
        log.pause();
        log.append("s", "Tick", &json!({})).await;

        let target = Arc::new(RecordingTarget::default());
        let handle = log
            .subscribe(Checkpoint::new("sub", None), EventSink::new(1, target.clone()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(positions(&target).is_empty());
        assert_eq!(log.head_position().await.unwrap(), Some(1));

        log.resume();
        eventually(|| positions(&target) == vec![1]).await;
        handle.dispose().await;
    }

    #[tokio::test]
    async fn ordered_delivery_error_drops_subscription() {
        let log = InMemorySubscriber::new();
        for _ in 0..3 {
            log.append("s", "Tick", &json!({})).await;
        }
        let target = Arc::new(RecordingTarget {
            fail_at: Some(2),
            ..Default::default()
        });
        let handle = log
            .subscribe(Checkpoint::new("sub", None), EventSink::new(1, target.clone()))
            .await
            .unwrap();

        eventually(|| !target.drops.lock().unwrap().is_empty()).await;
        assert_eq!(positions(&target), vec![1, 2]);
        assert_eq!(target.drops.lock().unwrap()[0].1, DropReason::SubscriberError);
        handle.dispose().await;
    }

    #[tokio::test]
    async fn acknowledged_mode_records_acks_and_nacks() {
        let log = InMemorySubscriber::acknowledged();
        for _ in 0..3 {
            log.append("topic", "Msg", &json!({})).await;
        }
        let target = Arc::new(RecordingTarget {
            fail_at: Some(2),
            ..Default::default()
        });
        let handle = log
            .subscribe(Checkpoint::new("sub", None), EventSink::new(1, target.clone()))
            .await
            .unwrap();

        eventually(|| positions(&target).len() == 3).await;
        handle.dispose().await;
        assert_eq!(log.acked().await, vec![1, 3]);
        assert_eq!(log.nacked().await, vec![2]);
        assert_eq!(log.delivery_mode(), DeliveryMode::Acknowledged);
    }

    #[tokio::test]
    async fn control_prefix_classifies_events() {
        let log = InMemorySubscriber::new().with_control_prefix("$");
        let control = ReceivedEvent::new("1", "$metadata", 1, Vec::new());
        let domain = ReceivedEvent::new("2", "RoomBooked", 2, Vec::new());
        assert!(log.is_control_event(&control));
        assert!(!log.is_control_event(&domain));
        assert!(!InMemorySubscriber::new().is_control_event(&control));
    }

    #[tokio::test]
    async fn stream_positions_are_per_stream() {
        let log = InMemorySubscriber::new();
        log.append("a", "T", &json!({})).await;
        log.append("b", "T", &json!({})).await;
        log.append("a", "T", &json!({})).await;

        let events = log.shared.log.read().await.clone();
        assert_eq!(events[2].global_position, 3);
        assert_eq!(events[2].stream_position, 2);
        assert_eq!(events[1].stream.as_ref(), "b");
    }
}
