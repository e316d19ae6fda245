//! Subscriber Types and the Ordered Subscriber Set
//!
//! Domain types for tracking tick subscribers within one sentry instance.
//!
//! # Design
//!
//! The subscriber set is keyed by subscriber id in a `BTreeMap` so that
//! iteration order is a stable function of the ids alone. Fan-out walks the
//! set in that order every cycle, which keeps the sentry's step function
//! deterministic and re-derivable from its message history.

use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a subscriber.
pub type SubscriberId = Uuid;

/// Capability record describing where and how to deliver ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEndpoint {
    /// Opaque delivery address (a webhook URL for the bundled invoker).
    pub url: String,
    /// Per-delivery execution deadline; `None` uses the service default.
    pub deadline: Option<Duration>,
}

impl CallbackEndpoint {
    /// Create an endpoint with the default deadline.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            deadline: None,
        }
    }

    /// Create an endpoint with an explicit per-delivery deadline.
    #[must_use]
    pub fn with_deadline(url: impl Into<String>, deadline: Duration) -> Self {
        Self {
            url: url.into(),
            deadline: Some(deadline),
        }
    }
}

/// A registered tick recipient, owned by exactly one sentry instance.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// The subscriber's unique id.
    pub id: SubscriberId,
    /// Where to deliver ticks for this subscriber.
    pub callback: CallbackEndpoint,
}

// =============================================================================
// Control Messages
// =============================================================================

/// Request to add a subscriber to a sentry's set.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// The subscriber to admit.
    pub subscriber: Subscriber,
}

/// Request to remove a subscriber from a sentry's set.
///
/// Leave is idempotent: removing an unknown id is a no-op.
#[derive(Debug, Clone)]
pub struct LeaveRequest {
    /// The id of the subscriber to remove.
    pub subscriber_id: SubscriberId,
}

// =============================================================================
// Subscriber Set
// =============================================================================

/// A subscriber together with its per-subscriber slot payload.
///
/// The slot is whatever the owner attaches to each subscriber (the sentry
/// stores the delivery channel sender there).
#[derive(Debug)]
pub struct Registered<S> {
    /// The subscriber record.
    pub subscriber: Subscriber,
    /// Owner-attached payload.
    pub slot: S,
}

/// Ordered set of subscribers keyed by id.
///
/// Iteration order is ascending subscriber id, independent of insertion
/// order, so repeated walks over the same membership always visit
/// subscribers in the same sequence.
#[derive(Debug, Default)]
pub struct SubscriberSet<S> {
    entries: BTreeMap<SubscriberId, Registered<S>>,
}

impl<S> SubscriberSet<S> {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a subscriber.
    ///
    /// A repeated join for the same id supersedes the previous entry; the
    /// displaced entry (and its slot) is returned so the owner can retire it.
    pub fn insert(&mut self, subscriber: Subscriber, slot: S) -> Option<Registered<S>> {
        self.entries
            .insert(subscriber.id, Registered { subscriber, slot })
    }

    /// Remove a subscriber by id. Returns `None` if the id was not present.
    pub fn remove(&mut self, id: &SubscriberId) -> Option<Registered<S>> {
        self.entries.remove(id)
    }

    /// Whether the given id is currently a member.
    #[must_use]
    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterate members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&SubscriberId, &Registered<S>)> {
        self.entries.iter()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
