//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`ExchangeFeed`]: one live upstream price connection per invocation
//! - [`SentryDispatch`]: routing of join/leave signals to sentry instances
//! - [`CallbackInvoker`]: delivery of a tick to a subscriber's endpoint
//! - [`InstrumentCatalog`]: validation that a (venue, instrument) exists

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::subscription::{JoinRequest, LeaveRequest, SubscriberId};
use crate::domain::tick::{SentryKey, Tick};

// =============================================================================
// Exchange Feed
// =============================================================================

/// Hand-off channel from a feed adapter into its owning sentry's tick
/// mailbox. Closed when the sentry has terminated.
pub type TickSink = mpsc::UnboundedSender<Tick>;

/// Errors reported by a feed adapter.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The instrument cannot be mapped to the venue's stream naming.
    #[error("invalid instrument {instrument:?}: {reason}")]
    InvalidInstrument {
        /// The offending instrument name.
        instrument: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Transport-level connection failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The upstream closed the connection.
    #[error("connection closed by upstream")]
    ConnectionClosed,

    /// No upstream traffic within the staleness window.
    #[error("connection stalled")]
    Stalled,

    /// The listener ended on its own and will not recover.
    ///
    /// This is the terminal upstream condition, distinct from cooperative
    /// cancellation (which returns `Ok`).
    #[error("feed listener stopped")]
    ListenerStopped,
}

/// A venue-specific live price feed.
///
/// `listen` owns exactly one upstream connection for its duration. It
/// forwards each deduplicated quote change into `sink` as a [`Tick`] and
/// returns `Ok(())` only when cancelled cooperatively (or when the sink is
/// closed, meaning the owner is gone); any other exit is an error.
#[async_trait]
pub trait ExchangeFeed: Send + Sync {
    /// Name of the venue this feed connects to.
    fn venue(&self) -> &str;

    /// Connect and stream ticks for `instrument` until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidInstrument`] before connecting if the
    /// instrument cannot be mapped, and [`FeedError::ListenerStopped`] when
    /// the upstream terminates beyond recovery.
    async fn listen(
        &self,
        instrument: &str,
        sink: TickSink,
        cancel: CancellationToken,
    ) -> Result<(), FeedError>;
}

// =============================================================================
// Sentry Dispatch
// =============================================================================

/// Errors from routing a control message to a sentry.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No feed adapter is registered for the requested venue.
    #[error("no feed registered for venue {0:?}")]
    UnknownVenue(String),
}

/// Routing of join/leave signals to the sentry instance owning a key.
///
/// A join targeting a key with no live instance starts one; a leave
/// targeting a dead instance is dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentryDispatch: Send + Sync {
    /// Route a join to the sentry for `key`, starting it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownVenue`] when the key names a venue
    /// with no registered feed.
    async fn signal_join(&self, key: SentryKey, request: JoinRequest) -> Result<(), DispatchError>;

    /// Route a leave to the sentry for `key` if one is live.
    fn signal_leave(&self, key: &SentryKey, request: LeaveRequest);
}

// =============================================================================
// Callback Invoker
// =============================================================================

/// Errors from a single callback invocation.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The endpoint could not be reached.
    #[error("callback transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("callback returned status {0}")]
    Status(u16),
}

/// Dispatch of one tick to one subscriber's callback endpoint.
///
/// The invoker does not enforce the per-delivery deadline; the delivery
/// task bounds each invocation with a timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallbackInvoker: Send + Sync {
    /// Deliver `tick` to `url` on behalf of `subscriber_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError`] when the call cannot be completed; the
    /// caller decides whether the failure evicts the subscriber.
    async fn invoke(
        &self,
        url: &str,
        subscriber_id: SubscriberId,
        tick: &Tick,
    ) -> Result<(), CallbackError>;
}

// =============================================================================
// Instrument Catalog
// =============================================================================

/// Catalog answer for one venue lookup.
#[derive(Debug, Clone, Default)]
pub struct VenueListing {
    /// Whether the venue exists at all.
    pub exists: bool,
    /// Instruments the venue supports.
    pub instruments: Vec<String>,
}

/// Errors from catalog lookups.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog backend could not answer.
    #[error("catalog lookup failed: {0}")]
    Lookup(String),
}

/// Validation source for known venues and their instruments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstrumentCatalog: Send + Sync {
    /// Look up a venue and the instruments it supports.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the lookup itself fails; an unknown venue
    /// is reported through `VenueListing::exists`, not as an error.
    async fn venue_listing(&self, venue: &str) -> Result<VenueListing, CatalogError>;
}
