//! Connection Liveness Monitor
//!
//! Watches the time since the last upstream message on one WebSocket
//! connection. Beats on a sub-second cadence while the connection is
//! healthy, asks for a protocol ping when the upstream has been quiet for a
//! while, and declares the connection stale when the quiet period exceeds
//! the staleness window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for liveness monitoring.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Cadence of the monitor loop and of `Beat` events.
    pub beat_interval: Duration,
    /// Quiet period after which a protocol ping is requested.
    pub probe_after: Duration,
    /// Quiet period after which the connection is declared stale.
    pub stale_after: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            beat_interval: Duration::from_millis(300),
            probe_after: Duration::from_secs(5),
            stale_after: Duration::from_secs(20),
        }
    }
}

/// Events emitted by the liveness monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessEvent {
    /// The connection looks alive.
    Beat,
    /// The upstream has been quiet; send a protocol ping.
    Probe,
    /// The quiet period exceeded the staleness window; reconnect.
    Stale,
}

/// Shared record of the last upstream activity on a connection.
#[derive(Debug)]
pub struct FeedPulse {
    last_upstream: RwLock<Instant>,
}

impl Default for FeedPulse {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedPulse {
    /// Create a pulse that treats "now" as the last activity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_upstream: RwLock::new(Instant::now()),
        }
    }

    /// Record upstream activity (any inbound frame counts).
    pub fn mark_upstream(&self) {
        *self.last_upstream.write() = Instant::now();
    }

    /// Time since the last upstream activity.
    #[must_use]
    pub fn quiet_for(&self) -> Duration {
        self.last_upstream.read().elapsed()
    }
}

/// Monitor loop over one connection's pulse.
pub struct LivenessMonitor {
    config: LivenessConfig,
    pulse: Arc<FeedPulse>,
    event_tx: mpsc::Sender<LivenessEvent>,
    cancel: CancellationToken,
}

impl LivenessMonitor {
    /// Create a monitor over the given pulse.
    #[must_use]
    pub const fn new(
        config: LivenessConfig,
        pulse: Arc<FeedPulse>,
        event_tx: mpsc::Sender<LivenessEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            pulse,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled or the connection goes stale.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.config.beat_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("liveness monitor cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if self.assess().await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Classify the current quiet period and emit the matching event.
    ///
    /// Returns `Err(())` when the loop should exit (stale or orphaned).
    async fn assess(&self) -> Result<(), ()> {
        let quiet = self.pulse.quiet_for();

        let event = if quiet > self.config.stale_after {
            tracing::warn!(
                quiet_ms = quiet.as_millis(),
                stale_after_ms = self.config.stale_after.as_millis(),
                "upstream connection stale"
            );
            LivenessEvent::Stale
        } else if quiet > self.config.probe_after {
            LivenessEvent::Probe
        } else {
            LivenessEvent::Beat
        };

        let stale = event == LivenessEvent::Stale;
        if self.event_tx.send(event).await.is_err() {
            tracing::debug!("liveness event channel closed");
            return Err(());
        }
        if stale { Err(()) } else { Ok(()) }
    }
}
