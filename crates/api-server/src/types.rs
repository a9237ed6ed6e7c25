//! API request and response types

use serde::{Deserialize, Serialize};
use video_edit_common::AssetId;
use video_edit_core::{OperationRequest, ValidationIssue};
use video_edit_orchestrator::{TaskId, TaskState};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Landing page: service name and its routes
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// Supported operations grouped by category, plus upload limits
#[derive(Debug, Clone, Serialize)]
pub struct FeaturesResponse {
    pub interpreter: String,
    pub edit_operations: Vec<&'static str>,
    pub enhancement_operations: Vec<&'static str>,
    pub supported_formats: Vec<String>,
    pub max_upload_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub asset_id: AssetId,
    pub format: String,
    pub size_bytes: u64,
}

/// Body of `POST /api/v1/instruct`
#[derive(Debug, Clone, Deserialize)]
pub struct InstructRequest {
    pub asset_id: AssetId,
    pub instruction: String,
}

/// Body of `POST /api/v1/tasks`; exactly one of `instruction` and `operations`
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRequest {
    pub asset_id: AssetId,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub operations: Option<Vec<OperationRequest>>,
}

/// Body of `POST /api/v1/interpret`
#[derive(Debug, Clone, Deserialize)]
pub struct InterpretRequest {
    #[serde(default)]
    pub asset_id: Option<AssetId>,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub task_id: TaskId,
    pub state: TaskState,
}

/// Error body returned with every non-2xx status
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable category
    pub kind: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unrecognized: Vec<String>,
}
