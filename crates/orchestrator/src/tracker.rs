//! Task registry and lifecycle state machine
//!
//! ```text
//! queued ──> running ──> completed
//!   │           ├──────> failed
//!   │           └──────> cancelled
//!   └──────────────────> cancelled
//! ```
//!
//! At most one non-terminal task exists per asset. Records are never removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;
use video_edit_common::AssetId;
use video_edit_core::{
    ExecutionError, ExecutionResult, Operation, OperationKind, UnrecognizedIntent,
    ValidationWarning,
};

/// Unique identifier of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine has an edge from `self` to `next`
    #[must_use]
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of a task failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// An operation failed in the media engine
    Execution,
    /// The per-task deadline passed
    Timeout,
    /// Anything else (work directory setup, worker shutdown)
    Internal,
}

/// Error detail recorded on a failed task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_kind: Option<OperationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_intermediate: Option<PathBuf>,
}

impl TaskError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: TaskErrorKind::Internal,
            message: message.into(),
            operation_index: None,
            operation_kind: None,
            last_intermediate: None,
        }
    }
}

impl From<&ExecutionError> for TaskError {
    fn from(err: &ExecutionError) -> Self {
        let (kind, operation_index, operation_kind) = match err {
            ExecutionError::OperationFailed { index, kind, .. } => {
                (TaskErrorKind::Execution, Some(*index), Some(*kind))
            }
            ExecutionError::TimedOut { .. } => (TaskErrorKind::Timeout, None, None),
            _ => (TaskErrorKind::Internal, None, None),
        };
        Self {
            kind,
            message: err.to_string(),
            operation_index,
            operation_kind,
            last_intermediate: err.last_intermediate().cloned(),
        }
    }
}

/// Timing of one completed operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTiming {
    pub index: usize,
    pub kind: OperationKind,
    pub duration_secs: f64,
}

/// Result recorded on a completed task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    pub path: PathBuf,
    pub total_duration_secs: f64,
    pub steps: Vec<StepTiming>,
}

impl From<&ExecutionResult> for TaskOutput {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            path: result.output.clone(),
            total_duration_secs: result.total_duration.as_secs_f64(),
            steps: result
                .steps
                .iter()
                .map(|s| StepTiming {
                    index: s.index,
                    kind: s.kind,
                    duration_secs: s.duration.as_secs_f64(),
                })
                .collect(),
        }
    }
}

/// A requested state change
#[derive(Debug, Clone)]
pub enum Transition {
    Start,
    Complete(TaskOutput),
    Fail(TaskError),
    Cancel,
}

impl Transition {
    #[must_use]
    pub fn target(&self) -> TaskState {
        match self {
            Self::Start => TaskState::Running,
            Self::Complete(_) => TaskState::Completed,
            Self::Fail(_) => TaskState::Failed,
            Self::Cancel => TaskState::Cancelled,
        }
    }
}

/// One entry of a task's state history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub state: TaskState,
    pub at: DateTime<Utc>,
}

/// Everything the tracker needs to create a task
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    pub asset_id: AssetId,
    pub operations: Vec<Operation>,
    pub warnings: Vec<ValidationWarning>,
    /// Natural-language instruction the operations were compiled from
    pub instruction: Option<String>,
    pub unrecognized: Vec<UnrecognizedIntent>,
}

/// Snapshot of a task, as reported to clients
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub asset_id: AssetId,
    pub state: TaskState,
    pub operations: Vec<Operation>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unrecognized: Vec<UnrecognizedIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub cancel_requested: bool,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub history: Vec<StateChange>,
}

impl TaskView {
    /// States visited so far, oldest first
    #[must_use]
    pub fn states(&self) -> Vec<TaskState> {
        self.history.iter().map(|c| c.state).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Asset {asset_id} already has an unfinished task ({existing})")]
    DuplicateSubmission { asset_id: AssetId, existing: TaskId },

    #[error("Task {task_id} cannot move from {from} to {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },
}

#[derive(Debug)]
struct TaskRecord {
    id: TaskId,
    submission: TaskSubmission,
    state: TaskState,
    output: Option<TaskOutput>,
    error: Option<TaskError>,
    cancel: CancellationToken,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    history: Vec<StateChange>,
}

impl TaskRecord {
    fn view(&self) -> TaskView {
        TaskView {
            task_id: self.id,
            asset_id: self.submission.asset_id.clone(),
            state: self.state,
            operations: self.submission.operations.clone(),
            warnings: self.submission.warnings.clone(),
            instruction: self.submission.instruction.clone(),
            unrecognized: self.submission.unrecognized.clone(),
            output: self.output.clone(),
            error: self.error.clone(),
            cancel_requested: self.cancel.is_cancelled(),
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            history: self.history.clone(),
        }
    }

    fn apply(&mut self, transition: Transition) -> Result<TaskState, TrackerError> {
        let to = transition.target();
        if !self.state.can_transition_to(to) {
            return Err(TrackerError::IllegalTransition {
                task_id: self.id,
                from: self.state,
                to,
            });
        }

        let now = Utc::now();
        match transition {
            Transition::Start => self.started_at = Some(now),
            Transition::Complete(output) => self.output = Some(output),
            Transition::Fail(error) => self.error = Some(error),
            Transition::Cancel => self.cancel.cancel(),
        }
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        self.state = to;
        self.history.push(StateChange { state: to, at: now });
        Ok(to)
    }
}

/// Registry of all tasks
///
/// Each record sits behind its own mutex so independent tasks are updated
/// concurrently; the outer lock is only held to look records up or insert them.
pub struct TaskTracker {
    tasks: RwLock<HashMap<TaskId, Arc<Mutex<TaskRecord>>>>,
    active_by_asset: Mutex<HashMap<AssetId, TaskId>>,
    /// Bumped on every state change so waiters can re-check
    updates: watch::Sender<u64>,
}

impl TaskTracker {
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            tasks: RwLock::new(HashMap::with_capacity(64)),
            active_by_asset: Mutex::new(HashMap::new()),
            updates,
        }
    }

    /// Create a `queued` task
    pub async fn submit(&self, submission: TaskSubmission) -> Result<TaskId, TrackerError> {
        let mut active = self.active_by_asset.lock().await;
        if let Some(existing) = active.get(&submission.asset_id) {
            return Err(TrackerError::DuplicateSubmission {
                asset_id: submission.asset_id.clone(),
                existing: *existing,
            });
        }

        let id = TaskId::new();
        let now = Utc::now();
        active.insert(submission.asset_id.clone(), id);
        info!(
            "Task {} queued for asset {} ({} operations)",
            id,
            submission.asset_id,
            submission.operations.len()
        );
        let record = TaskRecord {
            id,
            submission,
            state: TaskState::Queued,
            output: None,
            error: None,
            cancel: CancellationToken::new(),
            submitted_at: now,
            started_at: None,
            completed_at: None,
            history: vec![StateChange {
                state: TaskState::Queued,
                at: now,
            }],
        };
        self.tasks
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(record)));
        drop(active);

        self.notify();
        Ok(id)
    }

    pub async fn get(&self, id: &TaskId) -> Result<TaskView, TrackerError> {
        let record = self.record(id).await?;
        let view = record.lock().await.view();
        Ok(view)
    }

    /// Apply a state change, enforcing the state machine
    pub async fn transition(
        &self,
        id: &TaskId,
        transition: Transition,
    ) -> Result<TaskState, TrackerError> {
        let record = self.record(id).await?;
        let mut record = record.lock().await;
        let state = record.apply(transition)?;
        debug!("Task {} -> {}", id, state);
        if state.is_terminal() {
            self.release(&record.submission.asset_id, id).await;
        }
        drop(record);

        self.notify();
        Ok(state)
    }

    /// Cancel a task
    ///
    /// A queued task is cancelled immediately. For a running task only the
    /// cooperative flag is set and `Running` is returned; the executor stops at
    /// the next operation boundary and the worker records the final state.
    pub async fn cancel(&self, id: &TaskId) -> Result<TaskState, TrackerError> {
        let record = self.record(id).await?;
        let mut record = record.lock().await;
        let state = match record.state {
            TaskState::Queued => {
                let state = record.apply(Transition::Cancel)?;
                self.release(&record.submission.asset_id, id).await;
                info!("Task {} cancelled before it started", id);
                state
            }
            TaskState::Running => {
                record.cancel.cancel();
                info!("Cancellation requested for running task {}", id);
                TaskState::Running
            }
            from => {
                return Err(TrackerError::IllegalTransition {
                    task_id: *id,
                    from,
                    to: TaskState::Cancelled,
                })
            }
        };
        drop(record);

        self.notify();
        Ok(state)
    }

    /// Cancellation token shared with the task's executor run
    pub async fn cancel_token(&self, id: &TaskId) -> Result<CancellationToken, TrackerError> {
        let record = self.record(id).await?;
        let token = record.lock().await.cancel.clone();
        Ok(token)
    }

    /// Non-terminal task for an asset, if any
    pub async fn active_task(&self, asset_id: &AssetId) -> Option<TaskId> {
        self.active_by_asset.lock().await.get(asset_id).copied()
    }

    /// All tasks, oldest submission first
    pub async fn list(&self) -> Vec<TaskView> {
        let records: Vec<Arc<Mutex<TaskRecord>>> =
            self.tasks.read().await.values().cloned().collect();
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            views.push(record.lock().await.view());
        }
        views.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        views
    }

    /// Wait until the task reaches a terminal state
    pub async fn wait_for_terminal(&self, id: &TaskId) -> Result<TaskView, TrackerError> {
        let mut updates = self.updates.subscribe();
        loop {
            let view = self.get(id).await?;
            if view.state.is_terminal() || updates.changed().await.is_err() {
                return Ok(view);
            }
        }
    }

    async fn record(&self, id: &TaskId) -> Result<Arc<Mutex<TaskRecord>>, TrackerError> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(TrackerError::NotFound(*id))
    }

    async fn release(&self, asset_id: &AssetId, id: &TaskId) {
        let mut active = self.active_by_asset.lock().await;
        if active.get(asset_id) == Some(id) {
            active.remove(asset_id);
        }
    }

    fn notify(&self) {
        self.updates.send_modify(|generation| *generation += 1);
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
