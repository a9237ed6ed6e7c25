//! Video Edit Orchestrator
//!
//! Owns the task lifecycle: turns a submission into a validated operation
//! sequence, queues it, runs it on a worker pool through the pipeline executor
//! and records the outcome in the [`TaskTracker`].
//!
//! ```text
//! submit ─> compile/validate ─> tracker (queued) ─> bounded queue
//!                                                      │
//!                            recorder <─ results <─ workers ─> executor ─> engine
//! ```

pub mod assets;
pub mod config;
pub mod service;
pub mod tracker;
mod worker;

pub use assets::{AssetStore, LocalAssetStore};
pub use config::{ConfigError, ServiceConfig};
pub use service::{
    EditRequest, EditService, EditServiceBuilder, ServiceError, SubmitError, Submission,
};
pub use tracker::{
    StateChange, StepTiming, TaskError, TaskErrorKind, TaskId, TaskOutput, TaskState,
    TaskSubmission, TaskTracker, TaskView, TrackerError, Transition,
};
