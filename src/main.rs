use anyhow::{Context, Result};
use bioportal::api::{create_app, TokenAppState};
use bioportal::config::{load_secret_key, AppConfig};
use bioportal::credentials::TokenStore;
use bioportal::lifecycle::TokenService;
use bioportal::rate_limit::{run_bucket_cleanup, RateLimiter};
use bioportal::relay;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// How often idle rate-limit buckets are dropped
const BUCKET_CLEANUP_INTERVAL_SECONDS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing subscriber
    let default_filter = if config.server.debug {
        "bioportal=debug"
    } else {
        "bioportal=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!("Bioportal starting...");

    // Fail fast before serving anything
    let key = Arc::new(load_secret_key()?);

    info!(
        port = config.server.port,
        db_path = %config.storage.db_path.display(),
        static_dir = %config.server.static_dir.display(),
        mock_mode = config.mock_mode(),
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_per_minute = config.rate_limit.per_minute,
        "Configuration loaded"
    );

    let store = Arc::new(
        TokenStore::new(&config.storage.db_path).context("Failed to initialize token store")?,
    );
    info!("Token store initialized");

    let relay = relay::from_config(&config.upstream)?;
    let service = Arc::new(TokenService::new(key, store, relay));

    let rate_limiter = if config.rate_limit.enabled {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.per_minute));
        tokio::spawn(run_bucket_cleanup(
            Arc::clone(&limiter),
            BUCKET_CLEANUP_INTERVAL_SECONDS,
        ));
        info!(per_minute = config.rate_limit.per_minute, "Rate limiting enabled");
        Some(limiter)
    } else {
        info!("Rate limiting disabled");
        None
    };

    let app = create_app(
        TokenAppState { service },
        rate_limiter,
        &config.server.static_dir,
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port))
        .await
        .context("Failed to bind API port")?;
    info!(port = config.server.port, "Bioportal listening");

    let server_handle = tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Bioportal stopped");

    Ok(())
}
