//! Venue Feed Adapters
//!
//! WebSocket adapters implementing the `ExchangeFeed` port. Each `listen`
//! call owns one upstream connection at a time, deduplicates top-of-book
//! updates, and forwards mid-price ticks into the owning sentry's mailbox.
//! Reconnection with exponential backoff and connection liveness monitoring
//! live here, inside the adapter, invisible to the sentry.

pub mod binance;
pub mod codec;
pub mod dedup;
pub mod heartbeat;
pub mod reconnect;

pub use binance::{BinanceFeed, BinanceFeedConfig};
pub use dedup::QuoteDeduper;
pub use heartbeat::{FeedPulse, LivenessConfig, LivenessEvent, LivenessMonitor};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
