//! Top-of-Book Deduplication
//!
//! Venues re-broadcast book-ticker frames even when the top of book has not
//! moved. The deduper keeps the last (best bid, best ask) pair seen on the
//! current connection and admits a frame only when either side changed.
//! State is scoped to one connection; a reconnect starts fresh, so the first
//! frame after a reconnect always passes.

use rust_decimal::Decimal;

/// Change detector over (best bid, best ask) pairs.
#[derive(Debug, Default)]
pub struct QuoteDeduper {
    last: Option<(Decimal, Decimal)>,
}

impl QuoteDeduper {
    /// Create a deduper with no prior observation.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Record a quote. Returns `true` when it differs from the previous one.
    pub fn observe(&mut self, bid: Decimal, ask: Decimal) -> bool {
        let changed = self.last != Some((bid, ask));
        self.last = Some((bid, ask));
        changed
    }
}
