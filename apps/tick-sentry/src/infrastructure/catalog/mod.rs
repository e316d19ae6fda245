//! Static Instrument Catalog
//!
//! Catalog backed by configuration rather than a venue API. The catalog
//! spec string lists venues and their instruments:
//!
//! ```text
//! binance=BTC-USDT|ETH-USDT;kraken=BTC-USD
//! ```

use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::ports::{CatalogError, InstrumentCatalog, VenueListing};

/// Errors from parsing a catalog spec string.
#[derive(Debug, thiserror::Error)]
pub enum CatalogSpecError {
    /// A venue entry was not `venue=INSTRUMENT|INSTRUMENT`.
    #[error("malformed catalog entry {0:?}")]
    MalformedEntry(String),
}

/// In-memory catalog of venues and their instruments.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    venues: HashMap<String, Vec<String>>,
}

impl StaticCatalog {
    /// Parse a catalog from its spec string.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogSpecError::MalformedEntry`] when an entry is missing
    /// its `=` or names no instruments.
    pub fn from_spec(spec: &str) -> Result<Self, CatalogSpecError> {
        let mut venues = HashMap::new();
        for entry in spec.split(';').filter(|e| !e.trim().is_empty()) {
            let (venue, instruments) = entry
                .split_once('=')
                .ok_or_else(|| CatalogSpecError::MalformedEntry(entry.to_string()))?;
            let instruments: Vec<String> = instruments
                .split('|')
                .map(str::trim)
                .filter(|i| !i.is_empty())
                .map(ToString::to_string)
                .collect();
            if venue.trim().is_empty() || instruments.is_empty() {
                return Err(CatalogSpecError::MalformedEntry(entry.to_string()));
            }
            venues.insert(venue.trim().to_string(), instruments);
        }
        Ok(Self { venues })
    }
}

#[async_trait]
impl InstrumentCatalog for StaticCatalog {
    async fn venue_listing(&self, venue: &str) -> Result<VenueListing, CatalogError> {
        Ok(self.venues.get(venue).map_or_else(VenueListing::default, |instruments| {
            VenueListing {
                exists: true,
                instruments: instruments.clone(),
            }
        }))
    }
}
