#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Tick Sentry - Per-Instrument Tick Distribution
//!
//! A service that watches live venue price streams and fans deduplicated
//! mid-price ticks out to registered subscriber callbacks. One sentry
//! actor runs per (venue, instrument) pair, started on the first join and
//! retired when the last subscriber leaves.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core fan-out types with no external dependencies
//!   - `tick`: Tick value type, sentry identity, instrument parsing
//!   - `subscription`: Subscriber records and the ordered subscriber set
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for feeds, dispatch, callbacks, catalog
//!   - `services`: Join/leave validation and service info
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: Binance WebSocket adapter with dedup and reconnection
//!   - `sentry`: The sentry actor, delivery tasks, and the directory
//!   - `callback`: Webhook delivery over HTTP
//!   - `catalog`: Static instrument catalog
//!   - `api`: Join/leave/info HTTP surface
//!   - `config`, `health`, `metrics`, `telemetry`: process plumbing
//!
//! # Data Flow
//!
//! ```text
//! Binance WS --> [feed adapter] --> tick mailbox --> [sentry] --fan-out-->
//!   per-subscriber slot (cap 1) --> [delivery task] --> webhook POST
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core fan-out types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::subscription::{
    CallbackEndpoint, JoinRequest, LeaveRequest, Subscriber, SubscriberId, SubscriberSet,
};
pub use domain::tick::{SentryKey, Tick, mid_price, split_pair};

// Ports
pub use application::ports::{
    CallbackError, CallbackInvoker, CatalogError, DispatchError, ExchangeFeed, FeedError,
    InstrumentCatalog, SentryDispatch, TickSink, VenueListing,
};

// Application services
pub use application::services::{
    JoinCommand, LeaveCommand, RegistrationError, RegistrationService, ServiceInfo,
};

// Infrastructure config
pub use infrastructure::config::{
    CatalogSettings, ConfigError, FeedSettings, SentrySettings, ServerSettings, ServiceConfig,
};

// Sentry actor and directory (for integration tests)
pub use infrastructure::sentry::{Sentry, SentryConfig, SentryDirectory, SentryHandle};

// Feed adapter
pub use infrastructure::feed::{BinanceFeed, BinanceFeedConfig};

// Catalog and callback adapters
pub use infrastructure::callback::WebhookInvoker;
pub use infrastructure::catalog::StaticCatalog;

// HTTP surfaces
pub use infrastructure::api::{ApiServer, ApiServerError};
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics and telemetry
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::telemetry::init as init_telemetry;
