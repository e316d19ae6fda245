//! Binance Feed Adapter
//!
//! WebSocket client for the Binance `<symbol>@bookTicker` stream. One
//! `listen` call owns one connection at a time: it decodes top-of-book
//! frames, suppresses unchanged quotes, stamps each change with the local
//! wall clock, and forwards the mid price into the sentry's tick mailbox.
//!
//! Connection failures are retried with exponential backoff inside the
//! adapter. The sentry only ever sees the terminal outcome: `Ok(())` on
//! cooperative cancellation, `ListenerStopped` when the retry budget runs
//! out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{ExchangeFeed, FeedError, TickSink};
use crate::domain::tick::{Tick, mid_price, split_pair};
use crate::infrastructure::feed::codec::decode_frame;
use crate::infrastructure::feed::dedup::QuoteDeduper;
use crate::infrastructure::feed::heartbeat::{
    FeedPulse, LivenessConfig, LivenessEvent, LivenessMonitor,
};
use crate::infrastructure::feed::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::infrastructure::metrics;

/// Venue name reported by this adapter.
pub const VENUE: &str = "binance";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Binance feed adapter.
#[derive(Debug, Clone)]
pub struct BinanceFeedConfig {
    /// Base WebSocket endpoint (single-stream raw endpoint).
    pub url: String,
    /// Reconnection backoff settings.
    pub reconnect: ReconnectConfig,
    /// Connection liveness settings.
    pub liveness: LivenessConfig,
}

impl Default for BinanceFeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://stream.binance.com:9443/ws".to_string(),
            reconnect: ReconnectConfig::default(),
            liveness: LivenessConfig::default(),
        }
    }
}

/// Map a `BASE-QUOTE` instrument to the venue's lowercase stream symbol.
///
/// # Errors
///
/// Returns [`FeedError::InvalidInstrument`] when the instrument is not a
/// well-formed pair.
pub fn stream_symbol(instrument: &str) -> Result<String, FeedError> {
    let (base, quote) = split_pair(instrument).map_err(|e| FeedError::InvalidInstrument {
        instrument: instrument.to_string(),
        reason: e.to_string(),
    })?;
    Ok(format!("{}{}", base.to_lowercase(), quote.to_lowercase()))
}

// =============================================================================
// Adapter
// =============================================================================

/// How one connection ended without an error.
enum StreamEnd {
    /// The owner asked us to stop.
    Cancelled,
    /// The tick mailbox is gone; the owning sentry has terminated.
    SinkClosed,
}

/// `ExchangeFeed` implementation for Binance spot book-ticker streams.
pub struct BinanceFeed {
    config: BinanceFeedConfig,
}

impl BinanceFeed {
    /// Create an adapter with the given configuration.
    #[must_use]
    pub const fn new(config: BinanceFeedConfig) -> Self {
        Self { config }
    }

    /// Run one connection until it ends, forwarding deduplicated ticks.
    async fn connect_and_stream(
        &self,
        instrument: &str,
        symbol: &str,
        sink: &TickSink,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
    ) -> Result<StreamEnd, FeedError> {
        let url = format!("{}/{}@bookTicker", self.config.url, symbol);
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))?;
        // A completed handshake restarts the backoff schedule; only
        // consecutive failures count against the attempt budget.
        policy.reset();
        info!(venue = VENUE, instrument, "upstream connected");

        let (mut write, mut read) = ws_stream.split();

        // Fresh dedup and liveness state per connection.
        let mut dedup = QuoteDeduper::new();
        let pulse = Arc::new(FeedPulse::new());
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let monitor_cancel = cancel.child_token();
        let monitor = tokio::spawn(
            LivenessMonitor::new(
                self.config.liveness.clone(),
                Arc::clone(&pulse),
                event_tx,
                monitor_cancel.clone(),
            )
            .run(),
        );

        let outcome = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(venue = VENUE, instrument, "feed cancelled");
                    break Ok(StreamEnd::Cancelled);
                }
                event = event_rx.recv() => {
                    match event {
                        Some(LivenessEvent::Beat) => {
                            metrics::record_feed_heartbeat(VENUE);
                        }
                        Some(LivenessEvent::Probe) => {
                            if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                                break Err(FeedError::Connection(e.to_string()));
                            }
                        }
                        Some(LivenessEvent::Stale) | None => {
                            break Err(FeedError::Stalled);
                        }
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            pulse.mark_upstream();
                            match decode_frame(&text) {
                                Ok(frame) => {
                                    if !dedup.observe(frame.best_bid, frame.best_ask) {
                                        metrics::record_quote_deduplicated(VENUE);
                                        continue;
                                    }
                                    let tick = Tick::new(
                                        Utc::now(),
                                        VENUE.to_string(),
                                        instrument.to_string(),
                                        mid_price(frame.best_bid, frame.best_ask),
                                    );
                                    metrics::record_tick_received(VENUE, instrument);
                                    if sink.send(tick).is_err() {
                                        break Ok(StreamEnd::SinkClosed);
                                    }
                                }
                                Err(e) => {
                                    warn!(venue = VENUE, instrument, error = %e, "dropping undecodable frame");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            pulse.mark_upstream();
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                break Err(FeedError::Connection(e.to_string()));
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pulse.mark_upstream();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(venue = VENUE, instrument, ?frame, "upstream close frame");
                            break Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            pulse.mark_upstream();
                        }
                        Some(Err(e)) => {
                            break Err(FeedError::Connection(e.to_string()));
                        }
                        None => {
                            break Err(FeedError::ConnectionClosed);
                        }
                    }
                }
            }
        };

        monitor_cancel.cancel();
        let _ = monitor.await;
        outcome
    }
}

#[async_trait]
impl ExchangeFeed for BinanceFeed {
    fn venue(&self) -> &str {
        VENUE
    }

    async fn listen(
        &self,
        instrument: &str,
        sink: TickSink,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        // Reject unmappable instruments before touching the network.
        let symbol = stream_symbol(instrument)?;

        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        loop {
            match self
                .connect_and_stream(instrument, &symbol, &sink, &cancel, &mut policy)
                .await
            {
                Ok(StreamEnd::Cancelled) => return Ok(()),
                Ok(StreamEnd::SinkClosed) => {
                    debug!(venue = VENUE, instrument, "tick sink closed, stopping feed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(venue = VENUE, instrument, error = %e, "upstream connection lost");
                    metrics::record_feed_reconnect(VENUE);
                }
            }

            let Some(delay) = policy.next_delay() else {
                warn!(
                    venue = VENUE,
                    instrument,
                    attempts = policy.attempt_count(),
                    "reconnect budget exhausted"
                );
                return Err(FeedError::ListenerStopped);
            };

            debug!(
                venue = VENUE,
                instrument,
                delay_ms = delay.as_millis(),
                attempt = policy.attempt_count(),
                "reconnecting after backoff"
            );
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("BTC-USDT", "btcusdt"; "btc usdt")]
    #[test_case("ETH-USDT", "ethusdt"; "eth usdt")]
    #[test_case("sol-usdc", "solusdc"; "already lowercase")]
    fn maps_instruments_to_stream_symbols(instrument: &str, expected: &str) {
        assert_eq!(stream_symbol(instrument).unwrap(), expected);
    }

    #[test_case("BTCUSDT"; "missing separator")]
    #[test_case("BTC-"; "empty quote")]
    #[test_case("-USDT"; "empty base")]
    #[test_case("BTC-USDT-PERP"; "extra segment")]
    fn rejects_unmappable_instruments(instrument: &str) {
        assert!(matches!(
            stream_symbol(instrument),
            Err(FeedError::InvalidInstrument { .. })
        ));
    }

    #[tokio::test]
    async fn listen_rejects_bad_instrument_before_connecting() {
        let feed = BinanceFeed::new(BinanceFeedConfig::default());
        let (sink, _rx) = mpsc::unbounded_channel();
        let result = feed
            .listen("BTCUSDT", sink, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FeedError::InvalidInstrument { .. })));
    }

    #[tokio::test]
    async fn listen_gives_up_after_retry_budget() {
        // Nothing listens on this port; every attempt fails fast.
        let feed = BinanceFeed::new(BinanceFeedConfig {
            url: "ws://127.0.0.1:1/ws".to_string(),
            reconnect: ReconnectConfig {
                initial_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(2),
                multiplier: 1.0,
                jitter_factor: 0.0,
                max_attempts: 2,
            },
            liveness: LivenessConfig::default(),
        });
        let (sink, _rx) = mpsc::unbounded_channel();
        let result = feed
            .listen("BTC-USDT", sink, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(FeedError::ListenerStopped)));
    }

    #[tokio::test]
    async fn successful_connection_restarts_the_retry_budget() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        // Complete the handshake for five connections, dropping each right
        // away; afterwards the port refuses connections.
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            for _ in 0..5 {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                if tokio_tungstenite::accept_async(stream).await.is_ok() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        let feed = BinanceFeed::new(BinanceFeedConfig {
            url: format!("ws://{addr}/ws"),
            reconnect: ReconnectConfig {
                initial_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(2),
                multiplier: 1.0,
                jitter_factor: 0.0,
                max_attempts: 2,
            },
            liveness: LivenessConfig::default(),
        });
        let (sink, _rx) = mpsc::unbounded_channel();
        let result = feed
            .listen("BTC-USDT", sink, CancellationToken::new())
            .await;

        // Each completed handshake reset the budget, so all five scripted
        // connections were reached before the final dial failures gave up.
        assert_eq!(accepted.load(Ordering::SeqCst), 5);
        assert!(matches!(result, Err(FeedError::ListenerStopped)));
    }

    #[tokio::test]
    async fn listen_returns_ok_when_cancelled_during_backoff() {
        let cancel = CancellationToken::new();
        let feed = BinanceFeed::new(BinanceFeedConfig {
            url: "ws://127.0.0.1:1/ws".to_string(),
            reconnect: ReconnectConfig {
                initial_delay: std::time::Duration::from_secs(30),
                max_delay: std::time::Duration::from_secs(30),
                multiplier: 1.0,
                jitter_factor: 0.0,
                max_attempts: 0,
            },
            liveness: LivenessConfig::default(),
        });
        let (sink, _rx) = mpsc::unbounded_channel();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let result = feed.listen("BTC-USDT", sink, cancel).await;
        assert!(result.is_ok());
    }
}
