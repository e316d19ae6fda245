//! Prometheus Metrics Module
//!
//! Exposes application metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Ticks**: upstream observations received, duplicates suppressed
//! - **Fan-out**: deliveries by outcome, busy-subscriber skips
//! - **Sentries**: live instance count, evictions
//! - **Feeds**: liveness beats and reconnects
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tick_sentry_ticks_received_total",
        "Deduplicated ticks received from venue feeds"
    );
    describe_counter!(
        "tick_sentry_quotes_deduplicated_total",
        "Upstream frames suppressed as unchanged top-of-book"
    );
    describe_counter!(
        "tick_sentry_fanout_skipped_total",
        "Fan-out attempts skipped because the subscriber was busy"
    );
    describe_counter!(
        "tick_sentry_deliveries_total",
        "Callback deliveries by outcome"
    );
    describe_counter!(
        "tick_sentry_evictions_total",
        "Subscribers evicted after a delivery deadline expired"
    );
    describe_counter!(
        "tick_sentry_feed_heartbeats_total",
        "Liveness beats emitted by healthy feed connections"
    );
    describe_counter!(
        "tick_sentry_feed_reconnects_total",
        "Upstream connection losses that triggered a reconnect"
    );

    describe_gauge!(
        "tick_sentry_active_sentries",
        "Sentry instances currently running"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome labels for callback deliveries.
#[derive(Debug, Clone, Copy)]
pub enum DeliveryOutcome {
    /// The callback completed within its deadline.
    Ok,
    /// The callback returned an error but stays subscribed.
    Failed,
    /// The callback exceeded its deadline and the subscriber was evicted.
    TimedOut,
}

impl DeliveryOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Record a deduplicated tick received from a venue feed.
pub fn record_tick_received(venue: &str, instrument: &str) {
    counter!(
        "tick_sentry_ticks_received_total",
        "venue" => venue.to_string(),
        "instrument" => instrument.to_string()
    )
    .increment(1);
}

/// Record a suppressed unchanged quote.
pub fn record_quote_deduplicated(venue: &str) {
    counter!(
        "tick_sentry_quotes_deduplicated_total",
        "venue" => venue.to_string()
    )
    .increment(1);
}

/// Record a fan-out skip for a busy subscriber.
pub fn record_fanout_skipped() {
    counter!("tick_sentry_fanout_skipped_total").increment(1);
}

/// Record one callback delivery attempt.
pub fn record_delivery(outcome: DeliveryOutcome) {
    counter!(
        "tick_sentry_deliveries_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a deadline eviction.
pub fn record_eviction() {
    counter!("tick_sentry_evictions_total").increment(1);
}

/// Record a liveness beat from a feed connection.
pub fn record_feed_heartbeat(venue: &str) {
    counter!(
        "tick_sentry_feed_heartbeats_total",
        "venue" => venue.to_string()
    )
    .increment(1);
}

/// Record an upstream connection loss.
pub fn record_feed_reconnect(venue: &str) {
    counter!(
        "tick_sentry_feed_reconnects_total",
        "venue" => venue.to_string()
    )
    .increment(1);
}

/// A sentry instance started.
pub fn sentry_started() {
    gauge!("tick_sentry_active_sentries").increment(1.0);
}

/// A sentry instance terminated.
pub fn sentry_stopped() {
    gauge!("tick_sentry_active_sentries").decrement(1.0);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_outcome_labels() {
        assert_eq!(DeliveryOutcome::Ok.as_str(), "ok");
        assert_eq!(DeliveryOutcome::Failed.as_str(), "failed");
        assert_eq!(DeliveryOutcome::TimedOut.as_str(), "timed_out");
    }
}
