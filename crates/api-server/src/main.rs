//! API Server Binary Entry Point

use anyhow::Context;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use video_edit_api_server::{start_server, ApiState};
use video_edit_orchestrator::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "video_edit_api_server=info,video_edit_orchestrator=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Optional YAML config; environment variables override it
    let config_path = std::env::var("VIDEO_EDIT_CONFIG").ok().map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    // Get bind address from environment or use default
    let addr = std::env::var("API_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = ApiState::from_config(config).context("Failed to start edit service")?;

    tracing::info!("Starting Video Edit Pipeline API Server");
    start_server(&addr, state)
        .await
        .with_context(|| format!("API server on {addr} stopped"))?;

    Ok(())
}
