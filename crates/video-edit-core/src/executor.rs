//! Sequential pipeline executor
//!
//! Runs a validated sequence one operation at a time. Step `i` reads the file
//! written by step `i - 1`; the first step reads the source asset and the last
//! one writes the final output path directly.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::context::ExecutionContext;
use crate::engine::MediaEngine;
use crate::error::ExecutionError;
use crate::operation::{Operation, OperationKind};

/// Result from a single operation
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub index: usize,
    pub kind: OperationKind,
    /// File the step wrote
    pub output: PathBuf,
    pub duration: Duration,
}

/// Result from a completed run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub output: PathBuf,
    pub steps: Vec<StepResult>,
    pub total_duration: Duration,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed(ExecutionResult),
    /// Stopped at an operation boundary after a cancel request
    Cancelled {
        completed_steps: usize,
        last_intermediate: Option<PathBuf>,
    },
}

pub struct PipelineExecutor {
    engine: Arc<dyn MediaEngine>,
    keep_intermediates: bool,
}

impl PipelineExecutor {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            keep_intermediates: false,
        }
    }

    /// Keep per-step files after a successful run
    #[must_use]
    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    #[must_use]
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub async fn execute(
        &self,
        operations: &[Operation],
        source: &Path,
        ctx: &ExecutionContext,
    ) -> Result<PipelineOutcome, ExecutionError> {
        if operations.is_empty() {
            return Err(ExecutionError::EmptySequence);
        }

        info!("=== Task {} started ===", ctx.task_id);
        info!(
            "Pipeline: {} operations on {} via {}",
            operations.len(),
            source.display(),
            self.engine.name()
        );

        create_dir(&ctx.work_dir).await?;
        if let Some(parent) = ctx.output_path.parent() {
            create_dir(parent).await?;
        }

        let extension = intermediate_extension(&ctx.output_path, source);
        let start_time = Instant::now();
        let total = operations.len();
        let mut steps = Vec::with_capacity(total);
        let mut intermediates: Vec<PathBuf> = Vec::with_capacity(total.saturating_sub(1));
        let mut current = source.to_path_buf();

        for (idx, operation) in operations.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                info!(
                    "Task {} cancelled after {}/{} operations",
                    ctx.task_id, idx, total
                );
                let last_intermediate = keep_only_last(&mut intermediates).await;
                return Ok(PipelineOutcome::Cancelled {
                    completed_steps: idx,
                    last_intermediate,
                });
            }
            if ctx.deadline_passed() {
                warn!(
                    "Task {} timed out after {}/{} operations",
                    ctx.task_id, idx, total
                );
                let last_intermediate = keep_only_last(&mut intermediates).await;
                return Err(ExecutionError::TimedOut {
                    completed_steps: idx,
                    total_steps: total,
                    last_intermediate,
                });
            }

            info!("--- Operation {}/{}: {} ---", idx + 1, total, operation);
            let is_last = idx + 1 == total;
            let step_output = if is_last {
                ctx.output_path.clone()
            } else {
                ctx.work_dir
                    .join(format!("step_{idx:02}_{}.{extension}", operation.kind))
            };

            let step_start = Instant::now();
            if let Err(e) = self.engine.apply(operation, &current, &step_output).await {
                error!("  ✗ Operation {} ({}) failed: {}", idx, operation.kind, e);
                remove_quietly(&step_output).await;
                let last_intermediate = keep_only_last(&mut intermediates).await;
                return Err(ExecutionError::OperationFailed {
                    index: idx,
                    kind: operation.kind,
                    detail: e.to_string(),
                    last_intermediate,
                });
            }

            let duration = step_start.elapsed();
            info!("  ✓ Completed in {:.2}s", duration.as_secs_f64());
            steps.push(StepResult {
                index: idx,
                kind: operation.kind,
                output: step_output.clone(),
                duration,
            });
            if !is_last {
                intermediates.push(step_output.clone());
            }
            current = step_output;
        }

        if !self.keep_intermediates {
            for path in &intermediates {
                remove_quietly(path).await;
            }
        }

        let total_duration = start_time.elapsed();
        info!("=== Task {} completed ===", ctx.task_id);
        info!("Total time: {:.2}s", total_duration.as_secs_f64());

        Ok(PipelineOutcome::Completed(ExecutionResult {
            output: current,
            steps,
            total_duration,
        }))
    }
}

async fn create_dir(path: &Path) -> Result<(), ExecutionError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ExecutionError::Setup {
            path: path.to_path_buf(),
            source,
        })
}

/// Intermediates use the output's container so every step writes the same format
fn intermediate_extension(output: &Path, source: &Path) -> String {
    video_edit_common::file_extension(output)
        .or_else(|| video_edit_common::file_extension(source))
        .unwrap_or_else(|| "mp4".to_string())
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Delete all intermediates but the newest one, which is returned for diagnostics
async fn keep_only_last(intermediates: &mut Vec<PathBuf>) -> Option<PathBuf> {
    let last = intermediates.pop();
    for path in intermediates.drain(..) {
        remove_quietly(&path).await;
    }
    last
}
