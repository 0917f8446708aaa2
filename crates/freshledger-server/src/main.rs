use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use freshledger_server::{AppState, ServerConfig, config::LogFormat, router};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("FRESHLEDGER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("freshledger.toml"));
    let config = ServerConfig::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    let app = router(AppState::in_memory(config.ledger.clone()));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
