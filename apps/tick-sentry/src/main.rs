//! Tick Sentry Binary
//!
//! Starts the tick distribution service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-sentry
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `TICK_SENTRY_CATALOG`: catalog spec, e.g. `binance=BTC-USDT|ETH-USDT`
//!
//! ## Optional
//! - `TICK_SENTRY_API_PORT`: join/leave API port (default: 8080)
//! - `TICK_SENTRY_HEALTH_PORT`: health/metrics port (default: 8082)
//! - `TICK_SENTRY_BINANCE_URL`: Binance WS endpoint
//! - `TICK_SENTRY_DELIVERY_DEADLINE_SECS`: default delivery deadline (default: 30)
//! - `TICK_SENTRY_BEAT_INTERVAL_MS`, `TICK_SENTRY_PROBE_AFTER_SECS`,
//!   `TICK_SENTRY_STALE_AFTER_SECS`: feed liveness tuning
//! - `TICK_SENTRY_RECONNECT_DELAY_INITIAL_MS`, `TICK_SENTRY_RECONNECT_DELAY_MAX_SECS`,
//!   `TICK_SENTRY_RECONNECT_DELAY_MULTIPLIER`, `TICK_SENTRY_MAX_RECONNECT_ATTEMPTS`:
//!   reconnection tuning
//! - `RUST_LOG`: log level (default: info)

use std::sync::Arc;

use tick_sentry::infrastructure::telemetry;
use tick_sentry::{
    ApiServer, BinanceFeed, BinanceFeedConfig, HealthServer, HealthServerState,
    RegistrationService, SentryDirectory, ServiceConfig, StaticCatalog, WebhookInvoker,
    init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    load_dotenv();
    telemetry::init();

    tracing::info!("starting tick sentry");

    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Wire the adapters into the directory.
    let invoker = Arc::new(WebhookInvoker::new()?);
    let mut directory = SentryDirectory::new(invoker, config.sentry.sentry());
    directory.register_feed(Arc::new(BinanceFeed::new(BinanceFeedConfig {
        url: config.feed.binance_url.clone(),
        reconnect: config.feed.reconnect(),
        liveness: config.feed.liveness(),
    })));
    let directory = Arc::new(directory);

    let catalog = Arc::new(StaticCatalog::from_spec(&config.catalog.spec)?);
    let registration = Arc::new(RegistrationService::new(catalog, Arc::clone(&directory) as Arc<dyn tick_sentry::SentryDispatch>));

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&directory),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "health server error");
        }
    });

    // Control API
    let api_server = ApiServer::new(config.server.api_port, registration, shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "api server error");
        }
    });

    tracing::info!("tick sentry ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("tick sentry stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        api_port = config.server.api_port,
        health_port = config.server.health_port,
        delivery_deadline_secs = config.sentry.delivery_deadline.as_secs(),
        "configuration loaded"
    );
    tracing::debug!(
        binance_url = %config.feed.binance_url,
        beat_interval_ms = config.feed.beat_interval.as_millis(),
        stale_after_secs = config.feed.stale_after.as_secs(),
        "feed settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
