//! Infrastructure Layer - Adapters for external systems.
//!
//! This layer contains the concrete implementations of the application
//! ports plus the process-level surfaces (HTTP API, health, metrics,
//! telemetry, configuration).

/// HTTP control surface for join/leave/info.
pub mod api;

/// Webhook callback invoker.
pub mod callback;

/// Instrument catalog backed by static configuration.
pub mod catalog;

/// Environment-based configuration.
pub mod config;

/// Venue feed adapters (WebSocket market data).
pub mod feed;

/// Health and metrics HTTP endpoints.
pub mod health;

/// Prometheus metrics recorder and helpers.
pub mod metrics;

/// Sentry actor, delivery tasks, and the sentry directory.
pub mod sentry;

/// Tracing subscriber setup.
pub mod telemetry;
