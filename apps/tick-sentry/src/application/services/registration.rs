//! Registration Service
//!
//! Validates join and leave requests before they reach a sentry. Joins are
//! checked for required fields and against the instrument catalog; leaves
//! only need well-formed fields, since the target sentry may already be
//! gone and removal of an unknown id is a no-op anyway.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::application::ports::{
    CatalogError, DispatchError, InstrumentCatalog, SentryDispatch,
};
use crate::domain::subscription::{
    CallbackEndpoint, JoinRequest, LeaveRequest, Subscriber, SubscriberId,
};
use crate::domain::tick::SentryKey;

// =============================================================================
// Errors
// =============================================================================

/// Validation and routing failures for registration requests.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The subscriber id was absent or nil.
    #[error("subscriber id is required")]
    MissingSubscriberId,

    /// The venue field was empty.
    #[error("venue is required")]
    MissingVenue,

    /// The instrument field was empty.
    #[error("instrument is required")]
    MissingInstrument,

    /// The callback endpoint was empty.
    #[error("callback endpoint is required")]
    MissingCallback,

    /// The venue is not present in the catalog.
    #[error("unknown venue {0:?}")]
    UnknownVenue(String),

    /// The venue exists but does not list the instrument.
    #[error("venue {venue:?} does not list instrument {instrument:?}")]
    UnknownInstrument {
        /// The venue that was queried.
        venue: String,
        /// The instrument the venue does not carry.
        instrument: String,
    },

    /// The catalog lookup itself failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The join could not be routed to a sentry.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

// =============================================================================
// Service Info
// =============================================================================

/// Build-time information reported by the info endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceInfo {
    /// Crate version baked in at compile time.
    pub version: &'static str,
}

// =============================================================================
// Registration Service
// =============================================================================

/// Join request as received from the outer surface, before validation.
#[derive(Debug, Clone)]
pub struct JoinCommand {
    /// Venue to subscribe on.
    pub venue: String,
    /// Instrument to subscribe to.
    pub instrument: String,
    /// Id of the subscriber joining.
    pub subscriber_id: SubscriberId,
    /// Where ticks should be delivered.
    pub callback: CallbackEndpoint,
}

/// Leave request as received from the outer surface, before validation.
#[derive(Debug, Clone)]
pub struct LeaveCommand {
    /// Venue the subscription was made on.
    pub venue: String,
    /// Instrument the subscription targeted.
    pub instrument: String,
    /// Id of the subscriber leaving.
    pub subscriber_id: SubscriberId,
}

/// Front door for subscription management.
pub struct RegistrationService {
    catalog: Arc<dyn InstrumentCatalog>,
    dispatch: Arc<dyn SentryDispatch>,
}

impl RegistrationService {
    /// Create a service over a catalog and a sentry dispatcher.
    pub fn new(catalog: Arc<dyn InstrumentCatalog>, dispatch: Arc<dyn SentryDispatch>) -> Self {
        Self { catalog, dispatch }
    }

    /// Validate a join and signal it to the owning sentry.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] when a required field is missing, the
    /// (venue, instrument) pair is not in the catalog, the catalog lookup
    /// fails, or the join cannot be routed.
    pub async fn join(&self, command: JoinCommand) -> Result<(), RegistrationError> {
        if command.subscriber_id == Uuid::nil() {
            return Err(RegistrationError::MissingSubscriberId);
        }
        if command.venue.is_empty() {
            return Err(RegistrationError::MissingVenue);
        }
        if command.instrument.is_empty() {
            return Err(RegistrationError::MissingInstrument);
        }
        if command.callback.url.is_empty() {
            return Err(RegistrationError::MissingCallback);
        }

        let listing = self.catalog.venue_listing(&command.venue).await?;
        if !listing.exists {
            return Err(RegistrationError::UnknownVenue(command.venue));
        }
        if !listing.instruments.iter().any(|i| *i == command.instrument) {
            return Err(RegistrationError::UnknownInstrument {
                venue: command.venue,
                instrument: command.instrument,
            });
        }

        let key = SentryKey::new(command.venue, command.instrument);
        info!(
            sentry = %key,
            subscriber_id = %command.subscriber_id,
            "admitting subscriber"
        );

        let request = JoinRequest {
            subscriber: Subscriber {
                id: command.subscriber_id,
                callback: command.callback,
            },
        };
        self.dispatch.signal_join(key, request).await?;
        Ok(())
    }

    /// Validate a leave and signal it to the owning sentry.
    ///
    /// No catalog check: a leave for a pair that never had a sentry is
    /// harmless, and the catalog may have changed since the join.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] when a required field is missing.
    pub fn leave(&self, command: LeaveCommand) -> Result<(), RegistrationError> {
        if command.subscriber_id == Uuid::nil() {
            return Err(RegistrationError::MissingSubscriberId);
        }
        if command.venue.is_empty() {
            return Err(RegistrationError::MissingVenue);
        }
        if command.instrument.is_empty() {
            return Err(RegistrationError::MissingInstrument);
        }

        let key = SentryKey::new(command.venue, command.instrument);
        debug!(sentry = %key, subscriber_id = %command.subscriber_id, "retiring subscriber");
        self.dispatch
            .signal_leave(&key, LeaveRequest { subscriber_id: command.subscriber_id });
        Ok(())
    }

    /// Static service information.
    #[must_use]
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
