//! Sentry Directory
//!
//! Routes join and leave signals to sentry instances by key, starting an
//! instance when a join targets a pair with none running. A handle whose
//! instance has terminated counts as absent: the next join replaces it
//! with a fresh instance, which is how a fully-drained pair comes back to
//! life later.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::application::ports::{
    CallbackInvoker, DispatchError, ExchangeFeed, SentryDispatch,
};
use crate::domain::subscription::{JoinRequest, LeaveRequest};
use crate::domain::tick::SentryKey;
use crate::infrastructure::sentry::{Sentry, SentryConfig, SentryHandle};

/// Registry of live sentry instances, one per (venue, instrument).
pub struct SentryDirectory {
    feeds: HashMap<String, Arc<dyn ExchangeFeed>>,
    invoker: Arc<dyn CallbackInvoker>,
    config: SentryConfig,
    sentries: Mutex<HashMap<SentryKey, SentryHandle>>,
}

impl SentryDirectory {
    /// Create a directory with no registered feeds.
    #[must_use]
    pub fn new(invoker: Arc<dyn CallbackInvoker>, config: SentryConfig) -> Self {
        Self {
            feeds: HashMap::new(),
            invoker,
            config,
            sentries: Mutex::new(HashMap::new()),
        }
    }

    /// Register the feed adapter serving one venue.
    pub fn register_feed(&mut self, feed: Arc<dyn ExchangeFeed>) {
        info!(venue = feed.venue(), "feed registered");
        self.feeds.insert(feed.venue().to_string(), feed);
    }

    /// Number of live sentry instances. Prunes terminated handles.
    #[must_use]
    pub fn active_sentries(&self) -> usize {
        let mut sentries = self.sentries.lock();
        sentries.retain(|_, handle| !handle.is_terminated());
        sentries.len()
    }

    fn start_instance(&self, key: &SentryKey, feed: Arc<dyn ExchangeFeed>) -> SentryHandle {
        debug!(sentry = %key, "starting sentry instance");
        Sentry::spawn(
            key.clone(),
            feed,
            Arc::clone(&self.invoker),
            self.config.clone(),
        )
    }
}

#[async_trait]
impl SentryDispatch for SentryDirectory {
    async fn signal_join(
        &self,
        key: SentryKey,
        request: JoinRequest,
    ) -> Result<(), DispatchError> {
        let feed = self
            .feeds
            .get(&key.venue)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownVenue(key.venue.clone()))?;

        let mut sentries = self.sentries.lock();
        let handle = sentries
            .entry(key.clone())
            .or_insert_with(|| self.start_instance(&key, Arc::clone(&feed)));

        // The instance may have terminated between cycles; a join sent to a
        // dead handle comes back and goes to a fresh instance instead.
        if let Err(request) = handle.join(request) {
            let fresh = self.start_instance(&key, feed);
            // A freshly-spawned instance is idle on its join mailbox, so
            // this send cannot fail.
            let _ = fresh.join(request);
            *handle = fresh;
        }
        Ok(())
    }

    fn signal_leave(&self, key: &SentryKey, request: LeaveRequest) {
        let sentries = self.sentries.lock();
        if let Some(handle) = sentries.get(key) {
            // A leave for a terminated instance is moot; drop it.
            handle.leave(request);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
