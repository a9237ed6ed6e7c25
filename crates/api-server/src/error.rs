//! Mapping of service errors to HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;
use video_edit_common::ProcessingError;
use video_edit_core::CompilationError;
use video_edit_orchestrator::{SubmitError, TrackerError};

use crate::types::ErrorResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                kind,
                error: error.into(),
                issues: Vec::new(),
                unrecognized: Vec::new(),
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        let message = err.to_string();
        match err {
            SubmitError::AssetNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "asset_not_found", message)
            }
            SubmitError::Validation(validation) => {
                let mut api = Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation", message);
                api.body.issues = validation.issues;
                api
            }
            SubmitError::Compilation(compilation) => {
                let mut api =
                    Self::new(StatusCode::UNPROCESSABLE_ENTITY, "compilation", message);
                if let CompilationError::NoRecognizedOperations { unrecognized, .. } = compilation
                {
                    api.body.unrecognized = unrecognized;
                }
                api
            }
            SubmitError::DuplicateSubmission { .. } => {
                Self::new(StatusCode::CONFLICT, "duplicate_submission", message)
            }
            SubmitError::QueueFull => Self::new(StatusCode::SERVICE_UNAVAILABLE, "queue_full", message),
            SubmitError::ShuttingDown => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "shutting_down", message)
            }
            SubmitError::Asset(e) => Self::from(e),
            SubmitError::Tracker(e) => Self::from(e),
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        let message = err.to_string();
        match err {
            TrackerError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "task_not_found", message),
            TrackerError::DuplicateSubmission { .. } => {
                Self::new(StatusCode::CONFLICT, "duplicate_submission", message)
            }
            TrackerError::IllegalTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "illegal_transition", message)
            }
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        let message = err.to_string();
        match err {
            ProcessingError::UnsupportedFormat(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format", message)
            }
            ProcessingError::FileTooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "file_too_large", message)
            }
            ProcessingError::AssetNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "asset_not_found", message)
            }
            _ => {
                error!("Internal error: {}", message);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}
