//! Run command: compile or parse, validate, then execute with ffmpeg

use anyhow::{Context as _, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use video_edit_core::{
    ExecutionContext, InstructionCompiler, OperationCatalog, OperationValidator,
    PipelineExecutor, PipelineOutcome,
};
use video_edit_ffmpeg::FfmpegEngine;
use video_edit_interpreter::build_interpreter;
use video_edit_orchestrator::TaskId;

use super::{load_config, probe_metadata};
use crate::parser::parse_ops_string;

#[derive(Args)]
pub struct RunCommand {
    /// Input media file path
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Editing instruction in plain language
    #[arg(short, long, conflicts_with = "ops", required_unless_present = "ops")]
    instruction: Option<String>,

    /// Explicit operations: "kind:name=value,...;kind;..."
    #[arg(long)]
    ops: Option<String>,

    /// Output file [default: <input stem>_edited.<ext> next to the input]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep per-step intermediate files
    #[arg(long, default_value = "false")]
    keep_intermediates: bool,
}

impl RunCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        if !self.input.is_file() {
            anyhow::bail!("Input file does not exist: {}", self.input.display());
        }
        let config = load_config(config_path)?;
        let catalog = OperationCatalog::standard();
        let validator = OperationValidator::new(catalog);
        let metadata = probe_metadata(&config, &self.input).await;

        let validated = match (&self.instruction, &self.ops) {
            (Some(instruction), _) => {
                let compiler = InstructionCompiler::with_catalog(
                    build_interpreter(&config.interpreter, &catalog)?,
                    catalog,
                );
                let compiled = compiler.compile(instruction, Some(&metadata)).await?;
                for skipped in &compiled.unrecognized {
                    warn!("Ignoring \"{}\": {}", skipped.text, skipped.reason);
                }
                validator.validate(&compiled.operations, &metadata)?
            }
            (None, Some(ops)) => validator.validate_requests(&parse_ops_string(ops)?, &metadata)?,
            (None, None) => anyhow::bail!("Provide --instruction or --ops"),
        };
        for warning in &validated.warnings {
            warn!("Operation {} ({}): {}", warning.index, warning.kind, warning.message);
        }

        let output = self.output.clone().unwrap_or_else(|| default_output(&self.input));
        let task_id = TaskId::new().to_string();
        let work_dir = config.work_dir.join(&task_id);

        info!("Plan for {}:", self.input.display());
        for (idx, operation) in validated.operations.iter().enumerate() {
            info!("  {}. {}", idx + 1, operation);
        }

        let engine = FfmpegEngine::new(config.ffmpeg_path.clone(), config.encode.clone());
        if !engine.is_available().await {
            anyhow::bail!("ffmpeg not found at {}", config.ffmpeg_path.display());
        }
        let executor = PipelineExecutor::new(Arc::new(engine))
            .with_keep_intermediates(self.keep_intermediates || config.keep_intermediates);

        // Ctrl-C stops the run at the next operation boundary
        let cancel = CancellationToken::new();
        let signal_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current operation");
                signal_token.cancel();
            }
        });

        let ctx = ExecutionContext::new(task_id, work_dir.clone(), output)
            .with_cancel(cancel)
            .with_timeout(config.task_timeout());

        let outcome = executor
            .execute(&validated.operations, &self.input, &ctx)
            .await
            .context("Edit failed")?;
        // Only succeeds when no intermediates were left behind
        let _ = tokio::fs::remove_dir(&work_dir).await;

        match outcome {
            PipelineOutcome::Completed(result) => {
                for step in &result.steps {
                    println!(
                        "  {}. {} ({:.2}s)",
                        step.index + 1,
                        step.kind,
                        step.duration.as_secs_f64()
                    );
                }
                println!(
                    "✓ Wrote {} in {:.2}s",
                    result.output.display(),
                    result.total_duration.as_secs_f64()
                );
                Ok(())
            }
            PipelineOutcome::Cancelled {
                completed_steps,
                last_intermediate,
            } => {
                if let Some(path) = last_intermediate {
                    warn!("Last intermediate kept at {}", path.display());
                }
                anyhow::bail!(
                    "Cancelled after {}/{} operations",
                    completed_steps,
                    validated.operations.len()
                )
            }
        }
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = video_edit_common::file_extension(input).unwrap_or_else(|| "mp4".to_string());
    input.with_file_name(format!("{stem}_edited.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_sits_next_to_input() {
        assert_eq!(
            default_output(Path::new("/clips/holiday.MOV")),
            PathBuf::from("/clips/holiday_edited.mov")
        );
        assert_eq!(
            default_output(Path::new("raw")),
            PathBuf::from("raw_edited.mp4")
        );
    }
}
