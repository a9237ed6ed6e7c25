//! HTTP request handlers for API endpoints

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tokio_util::io::ReaderStream;
use tracing::info;
use video_edit_core::{OperationCategory, OperationKind};
use video_edit_orchestrator::{EditRequest, TaskId, TaskState};

use crate::error::ApiError;
use crate::types::{
    CancelResponse, FeaturesResponse, HealthResponse, InstructRequest, InterpretRequest,
    ServiceInfo, TaskRequest, UploadResponse,
};
use crate::ApiState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn service_info() -> impl IntoResponse {
    Json(ServiceInfo {
        name: "Video Edit Pipeline",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "GET /health",
            "GET /api/v1/features",
            "GET /api/v1/operations",
            "POST /api/v1/upload/{filename}",
            "POST /api/v1/instruct",
            "POST /api/v1/interpret",
            "GET /api/v1/tasks",
            "POST /api/v1/tasks",
            "GET /api/v1/tasks/{task_id}",
            "POST /api/v1/tasks/{task_id}/cancel",
            "GET /api/v1/tasks/{task_id}/download",
        ],
    })
}

pub async fn features(State(state): State<ApiState>) -> impl IntoResponse {
    let by_category = |category: OperationCategory| -> Vec<&'static str> {
        OperationKind::ALL
            .iter()
            .filter(|k| k.category() == category)
            .map(OperationKind::name)
            .collect()
    };
    let config = state.service.config();
    Json(FeaturesResponse {
        interpreter: state.service.interpreter_name().to_string(),
        edit_operations: by_category(OperationCategory::Edit),
        enhancement_operations: by_category(OperationCategory::Enhancement),
        supported_formats: state.uploads.formats().to_vec(),
        max_upload_mb: config.max_upload_mb,
    })
}

/// Catalog of operation kinds with their parameter schemas
pub async fn list_operations(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.list_operation_kinds())
}

/// Store the raw request body as a new asset
pub async fn upload(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    info!("Upload request: {} ({} bytes)", filename, body.len());
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is empty"));
    }
    let asset = state.uploads.save(&filename, &body).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            asset_id: asset.id,
            format: asset.format,
            size_bytes: asset.size_bytes,
        }),
    ))
}

/// Submit a natural-language instruction for an uploaded asset
pub async fn instruct(
    State(state): State<ApiState>,
    Json(request): Json<InstructRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Instruction for asset {}: {:?}", request.asset_id, request.instruction);
    let submission = state
        .service
        .submit(&request.asset_id, EditRequest::Instruction(request.instruction))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// Submit either an instruction or an explicit operation list
pub async fn create_task(
    State(state): State<ApiState>,
    Json(request): Json<TaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let edit = match (request.instruction, request.operations) {
        (Some(instruction), None) => EditRequest::Instruction(instruction),
        (None, Some(operations)) => EditRequest::Operations(operations),
        _ => {
            return Err(ApiError::bad_request(
                "provide exactly one of \"instruction\" or \"operations\"",
            ))
        }
    };
    let submission = state.service.submit(&request.asset_id, edit).await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// Compile an instruction without creating a task
pub async fn interpret(
    State(state): State<ApiState>,
    Json(request): Json<InterpretRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let compiled = state
        .service
        .interpret(request.asset_id.as_ref(), &request.instruction)
        .await?;
    Ok(Json(compiled))
}

pub async fn list_tasks(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.list_tasks().await)
}

pub async fn get_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    Ok(Json(state.service.status(&task_id).await?))
}

pub async fn cancel_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let state = state.service.cancel(&task_id).await?;
    Ok(Json(CancelResponse { task_id, state }))
}

/// Stream back the output of a completed task
pub async fn download(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let view = state.service.status(&task_id).await?;
    let output = match (view.state, view.output) {
        (TaskState::Completed, Some(output)) => output,
        (task_state, _) => {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "not_ready",
                format!("Task {task_id} is {task_state}; output is only available once completed"),
            ))
        }
    };

    let missing = |e: std::io::Error| {
        ApiError::new(
            StatusCode::GONE,
            "output_missing",
            format!("Output file is no longer available: {e}"),
        )
    };
    let file = tokio::fs::File::open(&output.path).await.map_err(missing)?;
    let length = file.metadata().await.map_err(missing)?.len();
    let filename = output
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output.mp4")
        .to_string();
    let content_type = match video_edit_common::file_extension(&output.path).as_deref() {
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        Some("flv") => "video/x-flv",
        _ => "video/mp4",
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid task id: {raw}")))
}
