//! Sentry Actor
//!
//! One sentry instance owns the fan-out for a single (venue, instrument)
//! pair. It consumes three mailboxes (join, leave, tick) in a fixed order
//! per cycle: block on the next tick, then drain pending joins, then drain
//! pending leaves, then fan the tick out to the surviving subscriber set in
//! ascending id order. Delivery runs through per-subscriber capacity-1
//! channels; a busy subscriber is skipped, never waited on.
//!
//! The instance starts its venue feed lazily on the first join and runs
//! until either the subscriber set is empty at the top of a cycle or the
//! feed stops on its own. On the empty-set exit the feed is cancelled and
//! awaited with a bounded wait. A terminated instance is gone for good;
//! the directory starts a fresh one when the pair is next joined.

pub mod delivery;
pub mod directory;

pub use directory::SentryDirectory;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{CallbackInvoker, ExchangeFeed};
use crate::domain::subscription::{JoinRequest, LeaveRequest, SubscriberSet};
use crate::domain::tick::{SentryKey, Tick};
use crate::infrastructure::metrics;
use crate::infrastructure::sentry::delivery::spawn_delivery;

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for one sentry instance.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// Default per-delivery deadline, overridable per join.
    pub delivery_deadline: Duration,
    /// Bounded wait for the feed task after cancellation.
    pub shutdown_wait: Duration,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            delivery_deadline: Duration::from_secs(30),
            shutdown_wait: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle to a running sentry instance.
#[derive(Debug, Clone)]
pub struct SentryHandle {
    join_tx: mpsc::UnboundedSender<JoinRequest>,
    leave_tx: mpsc::UnboundedSender<LeaveRequest>,
}

impl SentryHandle {
    /// Enqueue a join.
    ///
    /// # Errors
    ///
    /// Returns the request back when the instance has terminated, so the
    /// caller can retry against a fresh one.
    pub fn join(&self, request: JoinRequest) -> Result<(), JoinRequest> {
        self.join_tx.send(request).map_err(|e| e.0)
    }

    /// Enqueue a leave. Silently dropped if the instance has terminated.
    pub fn leave(&self, request: LeaveRequest) {
        let _ = self.leave_tx.send(request);
    }

    /// Whether the instance has terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.join_tx.is_closed()
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Factory for sentry instances.
pub struct Sentry;

impl Sentry {
    /// Spawn a sentry for `key` and return its handle.
    ///
    /// The feed is not started here; the instance waits for its first join.
    pub fn spawn(
        key: SentryKey,
        feed: Arc<dyn ExchangeFeed>,
        invoker: Arc<dyn CallbackInvoker>,
        config: SentryConfig,
    ) -> SentryHandle {
        let (join_tx, join_rx) = mpsc::unbounded_channel();
        let (leave_tx, leave_rx) = mpsc::unbounded_channel();
        let handle = SentryHandle {
            join_tx,
            leave_tx: leave_tx.clone(),
        };

        metrics::sentry_started();
        tokio::spawn(run(key, feed, invoker, config, join_rx, leave_rx, leave_tx));
        handle
    }
}

#[allow(clippy::too_many_lines)]
async fn run(
    key: SentryKey,
    feed: Arc<dyn ExchangeFeed>,
    invoker: Arc<dyn CallbackInvoker>,
    config: SentryConfig,
    mut join_rx: mpsc::UnboundedReceiver<JoinRequest>,
    mut leave_rx: mpsc::UnboundedReceiver<LeaveRequest>,
    leave_tx: mpsc::UnboundedSender<LeaveRequest>,
) {
    // Idle until the first subscriber shows up.
    let Some(first) = join_rx.recv().await else {
        metrics::sentry_stopped();
        return;
    };
    info!(sentry = %key, "first subscriber joined, starting feed");

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<Tick>();
    let cancel = CancellationToken::new();
    let feed_task = {
        let feed = Arc::clone(&feed);
        let instrument = key.instrument.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { feed.listen(&instrument, tick_tx, cancel).await })
    };

    let mut subscribers = SubscriberSet::new();
    admit(&key, &mut subscribers, first, &invoker, &config, &leave_tx);
    while let Ok(join) = join_rx.try_recv() {
        admit(&key, &mut subscribers, join, &invoker, &config, &leave_tx);
    }
    // A leave queued behind the first join must not strand the instance on
    // the tick mailbox.
    while let Ok(leave) = leave_rx.try_recv() {
        if subscribers.remove(&leave.subscriber_id).is_some() {
            debug!(sentry = %key, subscriber_id = %leave.subscriber_id, "subscriber left");
        }
    }

    loop {
        if subscribers.is_empty() {
            info!(sentry = %key, "subscriber set empty, shutting down");
            break;
        }

        // The feed task owns the only sender; a closed mailbox means the
        // listener stopped for good.
        let Some(tick) = tick_rx.recv().await else {
            warn!(sentry = %key, "tick mailbox closed, shutting down");
            break;
        };

        while let Ok(join) = join_rx.try_recv() {
            admit(&key, &mut subscribers, join, &invoker, &config, &leave_tx);
        }
        while let Ok(leave) = leave_rx.try_recv() {
            if subscribers.remove(&leave.subscriber_id).is_some() {
                debug!(sentry = %key, subscriber_id = %leave.subscriber_id, "subscriber left");
            }
        }

        fan_out(&subscribers, &tick);
    }

    cancel.cancel();
    match tokio::time::timeout(config.shutdown_wait, feed_task).await {
        Ok(Ok(Ok(()))) => debug!(sentry = %key, "feed stopped cleanly"),
        Ok(Ok(Err(e))) => warn!(sentry = %key, error = %e, "feed stopped with error"),
        Ok(Err(e)) => warn!(sentry = %key, error = %e, "feed task panicked"),
        Err(_) => warn!(
            sentry = %key,
            wait_ms = config.shutdown_wait.as_millis(),
            "feed did not stop within the shutdown wait"
        ),
    }

    metrics::sentry_stopped();
    info!(sentry = %key, "sentry terminated");
}

/// Admit one subscriber: spawn its delivery task and register the sender.
///
/// A repeated join for the same id supersedes the old registration; the
/// displaced sender is dropped here, which retires the old delivery task.
fn admit(
    key: &SentryKey,
    subscribers: &mut SubscriberSet<mpsc::Sender<Tick>>,
    join: JoinRequest,
    invoker: &Arc<dyn CallbackInvoker>,
    config: &SentryConfig,
    leave_tx: &mpsc::UnboundedSender<LeaveRequest>,
) {
    let subscriber = join.subscriber;
    debug!(sentry = %key, subscriber_id = %subscriber.id, "subscriber joined");
    let slot = spawn_delivery(
        subscriber.clone(),
        Arc::clone(invoker),
        config.delivery_deadline,
        leave_tx.clone(),
    );
    subscribers.insert(subscriber, slot);
}

/// Offer the tick to every subscriber in ascending id order.
///
/// `try_send` never waits: a full slot means the subscriber is still busy
/// with an earlier tick and this one is skipped for them. A closed slot
/// belongs to an evicted subscriber whose leave has not been drained yet.
fn fan_out(subscribers: &SubscriberSet<mpsc::Sender<Tick>>, tick: &Tick) {
    for (id, entry) in subscribers.iter() {
        match entry.slot.try_send(tick.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_fanout_skipped();
                debug!(subscriber_id = %id, "subscriber busy, skipping tick");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(subscriber_id = %id, "subscriber slot closed, skipping tick");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
