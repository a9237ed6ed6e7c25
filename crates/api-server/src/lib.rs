//! REST API Server for the video edit pipeline
//!
//! Uploads are stored as assets; instructions or explicit operation lists are
//! submitted against an asset and run asynchronously. Clients poll the task
//! and download the output once it has completed.

mod error;
mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use video_edit_orchestrator::{EditService, LocalAssetStore, ServiceConfig, ServiceError};

pub use error::ApiError;
pub use handlers::*;
pub use types::*;

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<EditService>,
    /// Upload side of the asset store; the service resolves ids through its own handle
    pub uploads: Arc<LocalAssetStore>,
}

impl ApiState {
    #[must_use]
    pub fn new(service: Arc<EditService>, uploads: Arc<LocalAssetStore>) -> Self {
        Self { service, uploads }
    }

    /// Production state: ffmpeg engine, ffprobe and the configured interpreter
    ///
    /// Starts the worker pool, so it must be called inside a tokio runtime.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let uploads = Arc::new(LocalAssetStore::from_config(&config));
        let service = EditService::builder(config)
            .asset_store(uploads.clone())
            .build()?;
        Ok(Self::new(Arc::new(service), uploads))
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    // Headroom over the asset limit so oversized uploads get a 413 from the store
    let body_limit = usize::try_from(state.uploads.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(1024 * 1024);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/api/v1/features", get(features))
        .route("/api/v1/operations", get(list_operations))
        .route("/api/v1/upload/{filename}", post(upload))
        .route("/api/v1/instruct", post(instruct))
        .route("/api/v1/interpret", post(interpret))
        .route("/api/v1/tasks", get(list_tasks).post(create_task))
        .route("/api/v1/tasks/{task_id}", get(get_task))
        .route("/api/v1/tasks/{task_id}/cancel", post(cancel_task))
        .route("/api/v1/tasks/{task_id}/download", get(download))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: ApiState) -> Result<(), std::io::Error> {
    let app = build_router(state);
    axum::serve(listener, app).await
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_from_config_uses_configured_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
            work_dir: dir.path().join("work"),
            max_upload_mb: 3,
            ..ServiceConfig::default()
        };

        let state = ApiState::from_config(config).unwrap();
        assert_eq!(state.uploads.root(), dir.path().join("uploads"));
        assert_eq!(state.uploads.max_bytes(), 3 * 1024 * 1024);
        assert_eq!(state.service.list_operation_kinds().len(), 12);
    }
}
