//! API Key Gate - Main Application Entry Point
//!
//! Serves the key administration API and guards protected routes with API key
//! authentication and per-key rate limiting.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool (lazily, so an unreachable database does not abort startup)
//! 3. Run database migrations
//! 4. Bootstrap the master admin key if no key exists
//! 5. Start the rate log sweeper
//! 6. Build HTTP router and start server on configured port

use std::sync::Arc;

use api_key_gate::{
    app, clock::SystemClock, config, db, services::key_store::BootstrapOutcome, state::AppState,
    store::PgStore,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(storage = %config.storage_target(), "Configuration loaded");

    let pool = db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.storage_timeout(),
    )?;
    tracing::info!("Database pool created");

    // Failures below leave the service running in degraded mode.
    match db::run_migrations(&pool).await {
        Ok(()) => tracing::info!("Database migrations complete"),
        Err(e) => tracing::error!(error = %e, "Database migrations failed"),
    }

    let store = Arc::new(PgStore::new(pool, config.storage_timeout()));
    let state = AppState::new(config, store.clone(), store, Arc::new(SystemClock));

    match state.key_store.bootstrap(&state.config.master_api_key).await {
        Ok(BootstrapOutcome::Created { id }) => {
            tracing::info!(key_id = id, "Master admin key created")
        }
        Ok(BootstrapOutcome::AlreadyInitialized) => {
            tracing::info!("API keys already present, bootstrap skipped")
        }
        Err(e) => tracing::error!(error = %e, "Bootstrap failed, continuing without an initial admin key"),
    }

    state
        .rate_limiter
        .clone()
        .spawn_sweeper(state.config.prune_interval());

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let app = app::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
