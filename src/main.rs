mod artifacts;
mod config;
mod error;
mod layout;
mod models;
mod pdf;
mod random;
mod render;
mod routes;
mod synth;
mod together;
mod wizard;

use anyhow::Context;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use crate::artifacts::ScratchDir;
use crate::config::Config;
use crate::routes::{router, AppState};
use crate::together::TogetherClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    tracing::info!("Using Together API key: {}", config.redacted_key());
    if config.together_api_key.is_none() {
        tracing::warn!("⚠️ TOGETHER_API_KEY is not set, gateway requests will fail");
    }

    let scratch = ScratchDir::new(config.scratch_dir.clone());
    tracing::info!("📁 Debug artifacts go to {}", config.scratch_dir.display());
    let together = TogetherClient::new(config.together_api_key.clone(), config.together_api_base.clone(), scratch);
    let app = router(AppState::new(together));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
