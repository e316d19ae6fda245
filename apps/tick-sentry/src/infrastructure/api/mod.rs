//! Subscription Control API
//!
//! HTTP surface for joining and leaving tick distribution, plus a small
//! info endpoint. The API validates nothing itself; requests go straight
//! to the registration service and its errors map onto status codes.
//!
//! # Endpoints
//!
//! - `POST /v1/join` - Subscribe a callback to a (venue, instrument) pair
//! - `POST /v1/leave` - Unsubscribe
//! - `GET /v1/info` - Service version

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{
    JoinCommand, LeaveCommand, RegistrationError, RegistrationService,
};
use crate::domain::subscription::{CallbackEndpoint, SubscriberId};

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of a join request.
#[derive(Debug, Deserialize)]
pub struct JoinBody {
    /// Venue to subscribe on.
    pub venue: String,
    /// Instrument to subscribe to.
    pub instrument: String,
    /// Id of the joining subscriber.
    pub subscriber_id: SubscriberId,
    /// Webhook URL ticks are delivered to.
    pub callback_url: String,
    /// Optional per-delivery deadline override, in seconds.
    pub deadline_secs: Option<u64>,
}

/// Body of a leave request.
#[derive(Debug, Deserialize)]
pub struct LeaveBody {
    /// Venue the subscription was made on.
    pub venue: String,
    /// Instrument the subscription targeted.
    pub instrument: String,
    /// Id of the leaving subscriber.
    pub subscriber_id: SubscriberId,
}

/// Error body returned for failed requests.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, error: &RegistrationError) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
}

fn registration_status(error: &RegistrationError) -> StatusCode {
    match error {
        RegistrationError::MissingSubscriberId
        | RegistrationError::MissingVenue
        | RegistrationError::MissingInstrument
        | RegistrationError::MissingCallback
        | RegistrationError::UnknownVenue(_)
        | RegistrationError::UnknownInstrument { .. }
        | RegistrationError::Dispatch(_) => StatusCode::BAD_REQUEST,
        RegistrationError::Catalog(_) => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// API Server
// =============================================================================

/// Errors from running the API server.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Could not bind the listen port.
    #[error("failed to bind api port {0}: {1}")]
    BindFailed(u16, String),
    /// The HTTP server failed while running.
    #[error("api server failed: {0}")]
    ServerFailed(String),
}

/// Subscription control HTTP server.
pub struct ApiServer {
    port: u16,
    registration: Arc<RegistrationService>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(
        port: u16,
        registration: Arc<RegistrationService>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            registration,
            cancel,
        }
    }

    /// Router over the given registration service.
    pub fn router(registration: Arc<RegistrationService>) -> Router {
        Router::new()
            .route("/v1/join", post(join_handler))
            .route("/v1/leave", post(leave_handler))
            .route("/v1/info", get(info_handler))
            .with_state(registration)
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = Self::router(self.registration);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "api server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("api server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn join_handler(
    State(registration): State<Arc<RegistrationService>>,
    Json(body): Json<JoinBody>,
) -> impl IntoResponse {
    let callback = match body.deadline_secs {
        Some(secs) => {
            CallbackEndpoint::with_deadline(body.callback_url, Duration::from_secs(secs))
        }
        None => CallbackEndpoint::new(body.callback_url),
    };
    let command = JoinCommand {
        venue: body.venue,
        instrument: body.instrument,
        subscriber_id: body.subscriber_id,
        callback,
    };

    match registration.join(command).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(registration_status(&e), &e).into_response(),
    }
}

async fn leave_handler(
    State(registration): State<Arc<RegistrationService>>,
    Json(body): Json<LeaveBody>,
) -> impl IntoResponse {
    let command = LeaveCommand {
        venue: body.venue,
        instrument: body.instrument,
        subscriber_id: body.subscriber_id,
    };

    match registration.leave(command) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(registration_status(&e), &e).into_response(),
    }
}

async fn info_handler(
    State(registration): State<Arc<RegistrationService>>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(registration.info()))
}

// =============================================================================
// Tests
// =============================================================================
