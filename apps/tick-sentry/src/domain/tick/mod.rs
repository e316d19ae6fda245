//! Tick Types
//!
//! The tick is the immutable unit of data distributed by the service:
//! one deduplicated price observation for one instrument on one venue.
//! `SentryKey` is the deterministic identity of the sentry instance that
//! owns the fan-out for a (venue, instrument) pair.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Tick
// =============================================================================

/// A single deduplicated price observation.
///
/// The price is the arithmetic midpoint of the best bid and best ask at the
/// moment the feed adapter forwarded the update; `observed_at` is the
/// adapter's wall clock at forward time, not the venue timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// When the adapter forwarded this observation.
    pub observed_at: DateTime<Utc>,
    /// The market venue the price came from (e.g. "binance").
    pub venue: String,
    /// The instrument the price refers to (e.g. "BTC-USDT").
    pub instrument: String,
    /// Midpoint of best bid and best ask.
    pub price: Decimal,
}

impl Tick {
    /// Create a new tick.
    #[must_use]
    pub const fn new(
        observed_at: DateTime<Utc>,
        venue: String,
        instrument: String,
        price: Decimal,
    ) -> Self {
        Self {
            observed_at,
            venue,
            instrument,
            price,
        }
    }
}

/// Compute the midpoint of a best bid / best ask pair.
#[must_use]
pub fn mid_price(bid: Decimal, ask: Decimal) -> Decimal {
    (bid + ask) / Decimal::TWO
}

// =============================================================================
// Sentry Key
// =============================================================================

/// Deterministic identity of a sentry instance.
///
/// At most one live sentry exists per key at any time; joins and leaves for
/// the same (venue, instrument) pair always resolve to the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SentryKey {
    /// The market venue.
    pub venue: String,
    /// The instrument within the venue.
    pub instrument: String,
}

impl SentryKey {
    /// Create a key from a venue and instrument pair.
    #[must_use]
    pub fn new(venue: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            instrument: instrument.into(),
        }
    }
}

impl std::fmt::Display for SentryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.venue, self.instrument)
    }
}

// =============================================================================
// Instrument Parsing
// =============================================================================

/// Error raised for malformed instrument names.
#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    /// The instrument is not a `BASE-QUOTE` pair.
    #[error("instrument {0:?} is not a BASE-QUOTE pair")]
    InvalidPair(String),
}

/// Split a `BASE-QUOTE` instrument into its base and quote assets.
///
/// # Errors
///
/// Returns `InstrumentError::InvalidPair` if the instrument does not contain
/// exactly one `-` separating two non-empty asset names.
pub fn split_pair(instrument: &str) -> Result<(&str, &str), InstrumentError> {
    match instrument.split_once('-') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('-') => {
            Ok((base, quote))
        }
        _ => Err(InstrumentError::InvalidPair(instrument.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
