//! Service facade used by the HTTP and CLI layers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use video_edit_common::{AssetId, AssetMetadata, ProcessingError};
use video_edit_core::{
    CompilationError, CompiledInstruction, InstructionCompiler, InterpretError, Interpreter,
    MediaEngine, MediaProbe, Operation, OperationCatalog, OperationDescriptor, OperationRequest,
    OperationValidator, PipelineExecutor, UnrecognizedIntent, ValidatedSequence, ValidationError,
    ValidationWarning,
};
use video_edit_ffmpeg::{FfmpegEngine, FfprobeProbe};
use video_edit_interpreter::build_interpreter;

use crate::assets::{AssetStore, LocalAssetStore};
use crate::config::{ConfigError, ServiceConfig};
use crate::tracker::{TaskId, TaskState, TaskSubmission, TaskTracker, TaskView, TrackerError};
use crate::worker::{Job, WorkerPool, WorkerSettings};

/// What the caller wants done to an asset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRequest {
    /// Free-form text, compiled into operations
    Instruction(String),
    /// Explicit operations, validated as given
    Operations(Vec<OperationRequest>),
}

/// Accepted submission
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub task_id: TaskId,
    pub state: TaskState,
    pub operations: Vec<Operation>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unrecognized: Vec<UnrecognizedIntent>,
}

/// Why a submission was refused; no task exists when one of these is returned
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("Asset {asset_id} already has an unfinished task ({existing})")]
    DuplicateSubmission { asset_id: AssetId, existing: TaskId },

    #[error("Task queue is full; try again later")]
    QueueFull,

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Asset error: {0}")]
    Asset(ProcessingError),

    #[error(transparent)]
    Tracker(TrackerError),
}

impl From<TrackerError> for SubmitError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::DuplicateSubmission { asset_id, existing } => {
                Self::DuplicateSubmission { asset_id, existing }
            }
            other => Self::Tracker(other),
        }
    }
}

/// Failures while assembling the service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up interpreter: {0}")]
    Interpreter(#[from] InterpretError),
}

/// Builder for [`EditService`]; every collaborator defaults to the production one
pub struct EditServiceBuilder {
    config: ServiceConfig,
    engine: Option<Arc<dyn MediaEngine>>,
    probe: Option<Arc<dyn MediaProbe>>,
    interpreter: Option<Arc<dyn Interpreter>>,
    assets: Option<Arc<dyn AssetStore>>,
}

impl EditServiceBuilder {
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn interpreter(mut self, interpreter: Arc<dyn Interpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    #[must_use]
    pub fn asset_store(mut self, assets: Arc<dyn AssetStore>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Assemble the service and start its workers; must run inside a tokio runtime
    pub fn build(self) -> Result<EditService, ServiceError> {
        let config = self.config;
        config.validate()?;
        let catalog = OperationCatalog::standard();

        let interpreter = match self.interpreter {
            Some(interpreter) => interpreter,
            None => build_interpreter(&config.interpreter, &catalog)?,
        };
        let engine = self.engine.unwrap_or_else(|| {
            Arc::new(FfmpegEngine::new(
                config.ffmpeg_path.clone(),
                config.encode.clone(),
            ))
        });
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(FfprobeProbe::new(config.ffprobe_path.clone())));
        let assets = self
            .assets
            .unwrap_or_else(|| Arc::new(LocalAssetStore::from_config(&config)));

        let executor = Arc::new(
            PipelineExecutor::new(engine).with_keep_intermediates(config.keep_intermediates),
        );
        let tracker = Arc::new(TaskTracker::new());
        let (queue, pool) = WorkerPool::spawn(
            WorkerSettings {
                workers: config.workers,
                queue_capacity: config.queue_capacity,
                work_dir: config.work_dir.clone(),
                task_timeout: config.task_timeout(),
            },
            Arc::clone(&executor),
            Arc::clone(&tracker),
        );

        info!(
            "Edit service ready: interpreter={}, engine={}",
            interpreter.name(),
            executor.engine_name()
        );

        Ok(EditService {
            compiler: InstructionCompiler::with_catalog(interpreter, catalog),
            validator: OperationValidator::new(catalog),
            catalog,
            config,
            tracker,
            assets,
            probe,
            queue,
            pool,
        })
    }
}

/// Entry point for submitting, inspecting and cancelling edit tasks
pub struct EditService {
    config: ServiceConfig,
    catalog: OperationCatalog,
    compiler: InstructionCompiler,
    validator: OperationValidator,
    tracker: Arc<TaskTracker>,
    assets: Arc<dyn AssetStore>,
    probe: Arc<dyn MediaProbe>,
    queue: mpsc::Sender<Job>,
    pool: WorkerPool,
}

impl EditService {
    #[must_use]
    pub fn builder(config: ServiceConfig) -> EditServiceBuilder {
        EditServiceBuilder {
            config,
            engine: None,
            probe: None,
            interpreter: None,
            assets: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn interpreter_name(&self) -> &str {
        self.compiler.interpreter_name()
    }

    /// Compile or validate the request and queue a task for it
    ///
    /// Validation and compilation failures are returned here and create no
    /// task; execution failures are only visible through [`Self::status`].
    pub async fn submit(
        &self,
        asset_id: &AssetId,
        request: EditRequest,
    ) -> Result<Submission, SubmitError> {
        let asset = self.assets.get(asset_id).await.map_err(|e| match e {
            ProcessingError::AssetNotFound(_) => SubmitError::AssetNotFound(asset_id.clone()),
            other => SubmitError::Asset(other),
        })?;

        // Cheap early rejection; the tracker re-checks atomically on insert
        if let Some(existing) = self.tracker.active_task(asset_id).await {
            return Err(SubmitError::DuplicateSubmission {
                asset_id: asset_id.clone(),
                existing,
            });
        }

        let metadata = self.metadata_for(&asset.path).await;
        let (validated, instruction, unrecognized) = match request {
            EditRequest::Instruction(text) => {
                let compiled = self.compiler.compile(&text, Some(&metadata)).await?;
                let validated = self.validator.validate(&compiled.operations, &metadata)?;
                (validated, Some(text), compiled.unrecognized)
            }
            EditRequest::Operations(requests) => {
                let validated = self.validator.validate_requests(&requests, &metadata)?;
                (validated, None, Vec::new())
            }
        };
        let ValidatedSequence {
            operations,
            warnings,
        } = validated;
        for warning in &warnings {
            warn!(
                "Asset {}: operation {} ({}): {}",
                asset_id, warning.index, warning.kind, warning.message
            );
        }

        let permit = self.queue.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => SubmitError::ShuttingDown,
        })?;

        let task_id = self
            .tracker
            .submit(TaskSubmission {
                asset_id: asset_id.clone(),
                operations: operations.clone(),
                warnings: warnings.clone(),
                instruction,
                unrecognized: unrecognized.clone(),
            })
            .await?;
        let cancel = self.tracker.cancel_token(&task_id).await?;

        permit.send(Job {
            task_id,
            source: asset.path.clone(),
            operations: operations.clone(),
            output_path: self.output_path(&task_id, &asset.format),
            cancel,
        });

        Ok(Submission {
            task_id,
            state: TaskState::Queued,
            operations,
            warnings,
            unrecognized,
        })
    }

    pub async fn status(&self, task_id: &TaskId) -> Result<TaskView, TrackerError> {
        self.tracker.get(task_id).await
    }

    pub async fn cancel(&self, task_id: &TaskId) -> Result<TaskState, TrackerError> {
        self.tracker.cancel(task_id).await
    }

    pub async fn list_tasks(&self) -> Vec<TaskView> {
        self.tracker.list().await
    }

    #[must_use]
    pub fn list_operation_kinds(&self) -> Vec<OperationDescriptor> {
        self.catalog.describe()
    }

    /// Compile an instruction without submitting it
    pub async fn interpret(
        &self,
        asset_id: Option<&AssetId>,
        instruction: &str,
    ) -> Result<CompiledInstruction, SubmitError> {
        let metadata = match asset_id {
            Some(id) => {
                let asset = self
                    .assets
                    .get(id)
                    .await
                    .map_err(|_| SubmitError::AssetNotFound(id.clone()))?;
                Some(self.metadata_for(&asset.path).await)
            }
            None => None,
        };
        Ok(self.compiler.compile(instruction, metadata.as_ref()).await?)
    }

    /// Wait for a terminal state, returning the latest view when `timeout` runs out
    pub async fn wait_for_terminal(
        &self,
        task_id: &TaskId,
        timeout: Duration,
    ) -> Result<TaskView, TrackerError> {
        match tokio::time::timeout(timeout, self.tracker.wait_for_terminal(task_id)).await {
            Ok(result) => result,
            Err(_) => self.tracker.get(task_id).await,
        }
    }

    /// Stop accepting work and wait for queued tasks to finish
    pub async fn shutdown(self) {
        info!("Shutting down edit service");
        let Self { queue, pool, .. } = self;
        drop(queue);
        pool.join().await;
    }

    fn output_path(&self, task_id: &TaskId, format: &str) -> PathBuf {
        let ext = if format.is_empty() { "mp4" } else { format };
        self.config
            .output_dir
            .join(format!("edited_{task_id}.{ext}"))
    }

    /// Probe the asset; unknown metadata only disables the checks that need it
    async fn metadata_for(&self, path: &Path) -> AssetMetadata {
        match self.probe.probe(path).await {
            Ok(info) => AssetMetadata::from(&info),
            Err(e) => {
                warn!("Could not probe {}: {}", path.display(), e);
                AssetMetadata::default()
            }
        }
    }
}
