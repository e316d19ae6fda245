//! Sentry Lifecycle and Fan-Out Integration Tests
//!
//! Drives sentry instances end to end with a scripted feed and a recording
//! callback invoker: join/leave handling, fan-out, busy-subscriber skips,
//! deadline eviction, empty-set shutdown, and instance recreation.
//!
//! The sentry drains its control mailboxes after each received tick, so
//! these tests push extra ticks to make queued joins and leaves take
//! effect.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tick_sentry::{
    CallbackEndpoint, CallbackError, CallbackInvoker, ExchangeFeed, FeedError, JoinRequest,
    LeaveRequest, Sentry, SentryConfig, SentryDispatch, SentryDirectory, SentryKey, Subscriber,
    SubscriberId, Tick, TickSink,
};

// =============================================================================
// Test Doubles
// =============================================================================

/// Feed whose ticks are pushed by the test through a side channel.
///
/// Each `listen` call consumes one scripted source. Dropping the source's
/// sender makes the listener stop; cancellation ends it cleanly.
struct ScriptedFeed {
    sources: Mutex<std::collections::VecDeque<mpsc::UnboundedReceiver<Tick>>>,
    listens: AtomicUsize,
    cancels: AtomicUsize,
}

impl ScriptedFeed {
    fn new() -> Self {
        Self {
            sources: Mutex::new(std::collections::VecDeque::new()),
            listens: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Queue a source for the next `listen` call.
    fn push_source(&self) -> mpsc::UnboundedSender<Tick> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sources.lock().push_back(rx);
        tx
    }

    fn listen_count(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }

    fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeFeed for ScriptedFeed {
    fn venue(&self) -> &str {
        "binance"
    }

    async fn listen(
        &self,
        _instrument: &str,
        sink: TickSink,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        let mut source = self
            .sources
            .lock()
            .pop_front()
            .expect("a scripted source must be queued before each listen");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    self.cancels.fetch_add(1, Ordering::SeqCst);
                    return Ok(());
                }
                tick = source.recv() => match tick {
                    Some(tick) => {
                        if sink.send(tick).is_err() {
                            return Ok(());
                        }
                    }
                    None => return Err(FeedError::ListenerStopped),
                },
            }
        }
    }
}

/// Invoker that records every delivery and can hang for chosen subscribers.
struct RecordingInvoker {
    deliveries: Mutex<Vec<(SubscriberId, Decimal)>>,
    hanging: Mutex<HashSet<SubscriberId>>,
}

impl RecordingInvoker {
    fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            hanging: Mutex::new(HashSet::new()),
        }
    }

    /// Make every delivery to `id` hang past any test deadline.
    fn hang_for(&self, id: SubscriberId) {
        self.hanging.lock().insert(id);
    }

    fn deliveries_for(&self, id: SubscriberId) -> Vec<Decimal> {
        self.deliveries
            .lock()
            .iter()
            .filter(|(sid, _)| *sid == id)
            .map(|(_, price)| *price)
            .collect()
    }
}

#[async_trait]
impl CallbackInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        _url: &str,
        subscriber_id: SubscriberId,
        tick: &Tick,
    ) -> Result<(), CallbackError> {
        if self.hanging.lock().contains(&subscriber_id) {
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
        self.deliveries.lock().push((subscriber_id, tick.price));
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn key() -> SentryKey {
    SentryKey::new("binance", "BTC-USDT")
}

fn tick(price: i64) -> Tick {
    Tick::new(
        Utc::now(),
        "binance".into(),
        "BTC-USDT".into(),
        Decimal::from(price),
    )
}

fn join(id: SubscriberId) -> JoinRequest {
    JoinRequest {
        subscriber: Subscriber {
            id,
            callback: CallbackEndpoint::new("http://localhost:9000/ticks"),
        },
    }
}

fn test_config() -> SentryConfig {
    SentryConfig {
        delivery_deadline: Duration::from_millis(200),
        shutdown_wait: Duration::from_secs(2),
    }
}

/// Poll `condition` until it holds or the timeout passes.
async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn single_subscriber_receives_ticks_in_order() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(key(), feed, Arc::clone(&invoker) as Arc<dyn CallbackInvoker>, test_config());
    let id = Uuid::new_v4();
    handle.join(join(id)).unwrap();

    for price in [100, 101, 102] {
        source.send(tick(price)).unwrap();
        let want = price;
        wait_until(
            || invoker.deliveries_for(id).contains(&Decimal::from(want)),
            "tick delivery",
        )
        .await;
    }

    assert_eq!(
        invoker.deliveries_for(id),
        vec![Decimal::from(100), Decimal::from(101), Decimal::from(102)]
    );
}

#[tokio::test]
async fn every_subscriber_gets_each_tick() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(key(), feed, Arc::clone(&invoker) as Arc<dyn CallbackInvoker>, test_config());
    let ids: Vec<SubscriberId> = (0..3).map(|_| Uuid::new_v4()).collect();
    handle.join(join(ids[0])).unwrap();

    // First tick starts the cycle; later joins are drained after it.
    source.send(tick(1)).unwrap();
    handle.join(join(ids[1])).unwrap();
    handle.join(join(ids[2])).unwrap();
    source.send(tick(2)).unwrap();

    for id in &ids {
        let id = *id;
        wait_until(
            || invoker.deliveries_for(id).contains(&Decimal::TWO),
            "delivery of the second tick to every subscriber",
        )
        .await;
    }
}

#[tokio::test]
async fn busy_subscriber_is_skipped_not_queued() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    // Long deadline so the hanging subscriber stays busy, not evicted.
    let config = SentryConfig {
        delivery_deadline: Duration::from_secs(600),
        shutdown_wait: Duration::from_secs(2),
    };
    let handle = Sentry::spawn(key(), feed, Arc::clone(&invoker) as Arc<dyn CallbackInvoker>, config);

    let fast = Uuid::new_v4();
    let slow = Uuid::new_v4();
    handle.join(join(fast)).unwrap();
    handle.join(join(slow)).unwrap();
    invoker.hang_for(slow);

    for price in 1..=5 {
        source.send(tick(price)).unwrap();
        wait_until(
            || invoker.deliveries_for(fast).len() == usize::try_from(price).unwrap(),
            "fast subscriber keeping up",
        )
        .await;
    }

    // The fast subscriber saw everything; the hanging one recorded nothing
    // because its first delivery never finished and later ticks were skipped.
    assert_eq!(invoker.deliveries_for(fast).len(), 5);
    assert!(invoker.deliveries_for(slow).is_empty());
}

#[tokio::test]
async fn deadline_overrun_evicts_only_the_slow_subscriber() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(key(), feed, Arc::clone(&invoker) as Arc<dyn CallbackInvoker>, test_config());
    let healthy = Uuid::new_v4();
    let doomed = Uuid::new_v4();
    handle.join(join(healthy)).unwrap();
    handle.join(join(doomed)).unwrap();
    invoker.hang_for(doomed);

    // First tick starts the doomed delivery; its deadline is 200ms.
    source.send(tick(1)).unwrap();
    wait_until(
        || invoker.deliveries_for(healthy).len() == 1,
        "healthy delivery of first tick",
    )
    .await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    // Later ticks still flow to the healthy subscriber.
    source.send(tick(2)).unwrap();
    source.send(tick(3)).unwrap();
    wait_until(
        || invoker.deliveries_for(healthy).len() == 3,
        "healthy deliveries after eviction",
    )
    .await;
    assert!(invoker.deliveries_for(doomed).is_empty());

    // The sentry stays alive: the healthy subscriber is still registered.
    assert!(!handle.is_terminated());
}

#[tokio::test]
async fn last_leave_shuts_down_and_cancels_feed_once() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(key(), Arc::clone(&feed) as Arc<dyn ExchangeFeed>, invoker, test_config());
    let id = Uuid::new_v4();
    handle.join(join(id)).unwrap();

    source.send(tick(1)).unwrap();
    handle.leave(LeaveRequest { subscriber_id: id });
    // The leave is drained when the next tick arrives.
    source.send(tick(2)).unwrap();

    wait_until(|| handle.is_terminated(), "sentry termination").await;
    wait_until(|| feed.cancel_count() == 1, "feed cancellation").await;
    assert_eq!(feed.listen_count(), 1);
}

#[tokio::test]
async fn leave_queued_before_the_first_tick_terminates_without_a_tick() {
    let feed = Arc::new(ScriptedFeed::new());
    let _source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(
        key(),
        Arc::clone(&feed) as Arc<dyn ExchangeFeed>,
        invoker,
        test_config(),
    );

    // Queue the leave before the join so both sit in the mailboxes when the
    // instance wakes; no tick is ever pushed.
    let id = Uuid::new_v4();
    handle.leave(LeaveRequest { subscriber_id: id });
    handle.join(join(id)).unwrap();

    wait_until(
        || handle.is_terminated(),
        "termination of an instance whose only subscriber left immediately",
    )
    .await;
    wait_until(|| feed.cancel_count() == 1, "feed cancellation").await;
}

#[tokio::test]
async fn feed_stop_terminates_the_sentry() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(key(), feed, invoker, test_config());
    handle.join(join(Uuid::new_v4())).unwrap();

    // Dropping the script source makes the listener stop for good.
    drop(source);

    wait_until(|| handle.is_terminated(), "sentry termination after feed stop").await;
}

#[tokio::test]
async fn directory_recreates_instance_after_termination() {
    let feed = Arc::new(ScriptedFeed::new());
    let first_source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let mut directory = SentryDirectory::new(invoker, test_config());
    directory.register_feed(Arc::clone(&feed) as Arc<dyn ExchangeFeed>);
    let directory = Arc::new(directory);

    let id = Uuid::new_v4();
    directory.signal_join(key(), join(id)).await.unwrap();
    wait_until(|| feed.listen_count() == 1, "first instance feed start").await;

    // Drain the pair: leave takes effect after the next tick.
    first_source.send(tick(1)).unwrap();
    directory.signal_leave(&key(), LeaveRequest { subscriber_id: id });
    first_source.send(tick(2)).unwrap();
    wait_until(|| directory.active_sentries() == 0, "instance termination").await;

    // A later join brings the pair back with a fresh instance and feed.
    let _second_source = feed.push_source();
    directory.signal_join(key(), join(Uuid::new_v4())).await.unwrap();
    wait_until(|| feed.listen_count() == 2, "second instance feed start").await;
    assert_eq!(directory.active_sentries(), 1);
}

#[tokio::test]
async fn repeated_join_updates_callback_without_duplicating() {
    let feed = Arc::new(ScriptedFeed::new());
    let source = feed.push_source();
    let invoker = Arc::new(RecordingInvoker::new());

    let handle = Sentry::spawn(key(), feed, Arc::clone(&invoker) as Arc<dyn CallbackInvoker>, test_config());
    let id = Uuid::new_v4();
    handle.join(join(id)).unwrap();

    source.send(tick(1)).unwrap();
    wait_until(|| invoker.deliveries_for(id).len() == 1, "first delivery").await;

    // Rejoin with the same id, then push another tick.
    handle.join(join(id)).unwrap();
    source.send(tick(2)).unwrap();
    source.send(tick(3)).unwrap();
    wait_until(
        || invoker.deliveries_for(id).contains(&Decimal::from(3)),
        "delivery after rejoin",
    )
    .await;

    // One delivery per tick; the rejoin did not fork a second stream.
    let count = invoker.deliveries_for(id).len();
    assert!(count <= 3, "expected at most one delivery per tick, got {count}");
}
