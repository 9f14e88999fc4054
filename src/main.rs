//! Blackout Server
//!
//! Run with: cargo run
//!
//! Configuration is read from `BLACKOUT_*` environment variables, see
//! [`blackout::config`]. RUST_LOG overrides the log filter (default:
//! blackout=info,tower_http=info).

use blackout::api::run_server;
use blackout::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blackout=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    tracing::info!("Blackout configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    match &config.data_dir {
        Some(dir) => tracing::info!("  Data directory: {}", dir.display()),
        None => tracing::info!("  Data directory: none (in-memory only)"),
    }
    tracing::info!(
        "  Default duration: {} seconds",
        config.default_duration_secs
    );
    tracing::info!("  Store timeout: {} ms", config.store_timeout_ms);
    tracing::info!(
        "  Audit webhook: {}",
        config.audit_webhook_url.as_deref().unwrap_or("disabled")
    );
    match config.retention_hours {
        Some(hours) => tracing::info!(
            "  Retention: {} hours, checked every {} seconds",
            hours,
            config.retention_check_interval_secs
        ),
        None => tracing::info!("  Retention: disabled"),
    }

    run_server(config).await
}
