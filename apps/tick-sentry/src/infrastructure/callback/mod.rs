//! Webhook Callback Invoker
//!
//! Delivers ticks to subscriber endpoints as HTTP POSTs. The JSON body
//! carries the subscriber id alongside the tick so endpoints shared by
//! multiple subscribers can tell deliveries apart.
//!
//! No deadline handling here: the delivery task wraps each invocation in
//! its own timeout, so the client is built without one.

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;

use crate::application::ports::{CallbackError, CallbackInvoker};
use crate::domain::subscription::SubscriberId;
use crate::domain::tick::Tick;

/// Wire format of one delivery.
#[derive(Debug, Serialize)]
struct DeliveryBody<'a> {
    subscriber_id: SubscriberId,
    tick: &'a Tick,
}

/// `CallbackInvoker` that POSTs ticks to webhook URLs.
pub struct WebhookInvoker {
    client: reqwest::Client,
}

impl WebhookInvoker {
    /// Create an invoker with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackInvoker for WebhookInvoker {
    async fn invoke(
        &self,
        url: &str,
        subscriber_id: SubscriberId,
        tick: &Tick,
    ) -> Result<(), CallbackError> {
        trace!(%subscriber_id, url, "posting tick");
        let response = self
            .client
            .post(url)
            .json(&DeliveryBody {
                subscriber_id,
                tick,
            })
            .send()
            .await
            .map_err(|e| CallbackError::Transport(e.to_string()))?;

        match response.error_for_status() {
            Ok(_) => Ok(()),
            Err(e) => Err(CallbackError::Status(
                e.status().map_or(0, |s| s.as_u16()),
            )),
        }
    }
}
