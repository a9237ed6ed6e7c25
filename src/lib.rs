//! Video Edit Pipeline
//!
//! Turns plain-language editing instructions ("trim the first 10 seconds and
//! rotate 90 degrees") into a validated sequence of catalog operations and
//! runs it against an uploaded video, one operation at a time.
//!
//! - [`video_edit_core`]: operation catalog, instruction compiler, validator, pipeline executor
//! - [`video_edit_interpreter`]: keyword and hosted-model instruction interpreters
//! - [`video_edit_ffmpeg`]: ffmpeg/ffprobe backed media engine and probe
//! - [`video_edit_orchestrator`]: asset store, task tracker, worker pool and service facade
//!
//! The HTTP server and the command-line tool live in their own crates.

pub use video_edit_common;
pub use video_edit_core;
pub use video_edit_ffmpeg;
pub use video_edit_interpreter;
pub use video_edit_orchestrator;

pub use video_edit_common::{AssetId, AssetMetadata, ProcessingError};
pub use video_edit_core::{
    CompilationError, ExecutionError, Operation, OperationCatalog, OperationKind,
    ValidationError,
};
pub use video_edit_orchestrator::{
    EditRequest, EditService, ServiceConfig, SubmitError, TaskId, TaskState, TaskView,
};
