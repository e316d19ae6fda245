//! Service Configuration Settings
//!
//! Configuration types for the tick distribution service, loaded from
//! environment variables. Every knob has a default; only the catalog spec
//! is required.

use std::time::Duration;

use crate::infrastructure::feed::{LivenessConfig, ReconnectConfig};
use crate::infrastructure::sentry::SentryConfig;

/// HTTP server ports.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port for the join/leave/info API.
    pub api_port: u16,
    /// Port for health and metrics endpoints.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 8080,
            health_port: 8082,
        }
    }
}

/// Upstream feed connection settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Binance single-stream WebSocket endpoint.
    pub binance_url: String,
    /// Cadence of the connection liveness beat.
    pub beat_interval: Duration,
    /// Quiet period before a protocol ping is sent.
    pub probe_after: Duration,
    /// Quiet period before the connection is declared stale.
    pub stale_after: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection backoff multiplier.
    pub reconnect_delay_multiplier: f64,
    /// Maximum consecutive reconnection attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        let liveness = LivenessConfig::default();
        let reconnect = ReconnectConfig::default();
        Self {
            binance_url: "wss://stream.binance.com:9443/ws".to_string(),
            beat_interval: liveness.beat_interval,
            probe_after: liveness.probe_after,
            stale_after: liveness.stale_after,
            reconnect_delay_initial: reconnect.initial_delay,
            reconnect_delay_max: reconnect.max_delay,
            reconnect_delay_multiplier: reconnect.multiplier,
            max_reconnect_attempts: reconnect.max_attempts,
        }
    }
}

impl FeedSettings {
    /// Liveness configuration derived from these settings.
    #[must_use]
    pub const fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            beat_interval: self.beat_interval,
            probe_after: self.probe_after,
            stale_after: self.stale_after,
        }
    }

    /// Reconnection configuration derived from these settings.
    #[must_use]
    pub const fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: self.reconnect_delay_initial,
            max_delay: self.reconnect_delay_max,
            multiplier: self.reconnect_delay_multiplier,
            jitter_factor: 0.1,
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Sentry actor settings.
#[derive(Debug, Clone)]
pub struct SentrySettings {
    /// Default per-delivery deadline.
    pub delivery_deadline: Duration,
    /// Bounded wait for a cancelled feed to stop.
    pub shutdown_wait: Duration,
}

impl Default for SentrySettings {
    fn default() -> Self {
        let config = SentryConfig::default();
        Self {
            delivery_deadline: config.delivery_deadline,
            shutdown_wait: config.shutdown_wait,
        }
    }
}

impl SentrySettings {
    /// Sentry configuration derived from these settings.
    #[must_use]
    pub const fn sentry(&self) -> SentryConfig {
        SentryConfig {
            delivery_deadline: self.delivery_deadline,
            shutdown_wait: self.shutdown_wait,
        }
    }
}

/// Instrument catalog settings.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Catalog spec string (`venue=PAIR|PAIR;venue2=PAIR`).
    pub spec: String,
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP server ports.
    pub server: ServerSettings,
    /// Upstream feed settings.
    pub feed: FeedSettings,
    /// Sentry actor settings.
    pub sentry: SentrySettings,
    /// Instrument catalog settings.
    pub catalog: CatalogSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TICK_SENTRY_CATALOG` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let spec = std::env::var("TICK_SENTRY_CATALOG")
            .map_err(|_| ConfigError::MissingEnvVar("TICK_SENTRY_CATALOG".to_string()))?;
        if spec.is_empty() {
            return Err(ConfigError::EmptyValue("TICK_SENTRY_CATALOG".to_string()));
        }

        let server = ServerSettings {
            api_port: parse_env_u16("TICK_SENTRY_API_PORT", ServerSettings::default().api_port),
            health_port: parse_env_u16(
                "TICK_SENTRY_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        let defaults = FeedSettings::default();
        let feed = FeedSettings {
            binance_url: std::env::var("TICK_SENTRY_BINANCE_URL")
                .unwrap_or(defaults.binance_url),
            beat_interval: parse_env_duration_millis(
                "TICK_SENTRY_BEAT_INTERVAL_MS",
                defaults.beat_interval,
            ),
            probe_after: parse_env_duration_secs(
                "TICK_SENTRY_PROBE_AFTER_SECS",
                defaults.probe_after,
            ),
            stale_after: parse_env_duration_secs(
                "TICK_SENTRY_STALE_AFTER_SECS",
                defaults.stale_after,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "TICK_SENTRY_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "TICK_SENTRY_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "TICK_SENTRY_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "TICK_SENTRY_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let sentry = SentrySettings {
            delivery_deadline: parse_env_duration_secs(
                "TICK_SENTRY_DELIVERY_DEADLINE_SECS",
                SentrySettings::default().delivery_deadline,
            ),
            shutdown_wait: parse_env_duration_secs(
                "TICK_SENTRY_SHUTDOWN_WAIT_SECS",
                SentrySettings::default().shutdown_wait,
            ),
        };

        Ok(Self {
            server,
            feed,
            sentry,
            catalog: CatalogSettings { spec },
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
