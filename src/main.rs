use anyhow::Context;
use tracing_subscriber::EnvFilter;

use shop_api_rust::app::{build_router, AppState};
use shop_api_rust::database::{self, StoreKind};
use shop_api_rust::{config, is_production};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    tracing::info!("Starting Shop API in {:?} mode", config.environment);

    if is_production!() && matches!(StoreKind::from_url(&config.database.url), Ok(StoreKind::Memory)) {
        tracing::warn!("Running production with the in-process store; data is lost on restart");
    }

    let store = database::connect(&config.database)
        .await
        .context("Failed to connect to the document store")?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, store)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Shop API listening on http://{}", bind_addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shop API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
