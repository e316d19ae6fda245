//! Per-Subscriber Delivery Task
//!
//! Each admitted subscriber gets a dedicated task that drains a capacity-1
//! channel and invokes the subscriber's callback for every tick it accepts.
//! The channel capacity is the backpressure mechanism: while an invocation
//! is in flight the channel stays full, so fan-out skips the subscriber
//! instead of queueing behind it.
//!
//! A callback error keeps the subscriber registered; only a deadline
//! overrun evicts it, by sending a leave back to the owning sentry. The
//! task exits when its channel closes, which is how the sentry retires it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::ports::CallbackInvoker;
use crate::domain::subscription::{LeaveRequest, Subscriber};
use crate::domain::tick::Tick;
use crate::infrastructure::metrics::{self, DeliveryOutcome};

/// Spawn the delivery task for one subscriber.
///
/// Returns the capacity-1 sender the sentry fans out into. Dropping the
/// sender stops the task.
pub fn spawn_delivery(
    subscriber: Subscriber,
    invoker: Arc<dyn CallbackInvoker>,
    default_deadline: Duration,
    leave_tx: mpsc::UnboundedSender<LeaveRequest>,
) -> mpsc::Sender<Tick> {
    let (tick_tx, tick_rx) = mpsc::channel(1);
    let deadline = subscriber.callback.deadline.unwrap_or(default_deadline);
    tokio::spawn(run(subscriber, invoker, deadline, tick_rx, leave_tx));
    tick_tx
}

async fn run(
    subscriber: Subscriber,
    invoker: Arc<dyn CallbackInvoker>,
    deadline: Duration,
    mut tick_rx: mpsc::Receiver<Tick>,
    leave_tx: mpsc::UnboundedSender<LeaveRequest>,
) {
    while let Some(tick) = tick_rx.recv().await {
        let attempt = invoker.invoke(&subscriber.callback.url, subscriber.id, &tick);
        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(())) => {
                metrics::record_delivery(DeliveryOutcome::Ok);
            }
            Ok(Err(e)) => {
                // Transient failure: drop this tick, keep the subscription.
                metrics::record_delivery(DeliveryOutcome::Failed);
                warn!(
                    subscriber_id = %subscriber.id,
                    error = %e,
                    "callback delivery failed"
                );
            }
            Err(_) => {
                metrics::record_delivery(DeliveryOutcome::TimedOut);
                metrics::record_eviction();
                warn!(
                    subscriber_id = %subscriber.id,
                    deadline_ms = deadline.as_millis(),
                    "callback deadline exceeded, evicting subscriber"
                );
                let _ = leave_tx.send(LeaveRequest {
                    subscriber_id: subscriber.id,
                });
                break;
            }
        }
    }
    debug!(subscriber_id = %subscriber.id, "delivery task stopped");
}
