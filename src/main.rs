mod adapter;
mod backend;
mod config;
mod controller;
mod credentials;
mod gemini;
mod models;
mod options;
mod prompts;
mod routes;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapter::Adapter;
use crate::config::AppConfig;
use crate::controller::{Controller, SWEEP_INTERVAL};
use crate::credentials::EnvCredentials;
use crate::gemini::GeminiClient;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    if config.has_api_key() {
        tracing::info!("🔑 GEMINI_API_KEY is set");
    } else {
        tracing::warn!("GEMINI_API_KEY is not set; analysis and captions will use fallbacks and generation will fail");
    }
    tracing::info!(
        text = %config.text_model,
        image = %config.image_model,
        image_pro = %config.image_pro_model,
        "Gemini models"
    );

    let gemini = GeminiClient::new(&config).context("building Gemini client")?;
    let controller = Controller::new(
        Adapter::new(Arc::new(gemini)),
        Arc::new(EnvCredentials::new(config.has_api_key())),
        config.max_upload_bytes,
    );
    let controller = Arc::new(controller);
    controller
        .clone()
        .spawn_sweeper(Duration::from_secs(config.session_ttl_secs), SWEEP_INTERVAL);
    let state = AppState { controller };

    let app = routes::router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("👋 Shutting down");
}
