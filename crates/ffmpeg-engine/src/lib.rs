//! FFmpeg media engine
//!
//! Applies catalog operations by shelling out to `ffmpeg`, one invocation per
//! operation, and probes inputs with `ffprobe`.
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use video_edit_core::{MediaEngine, Operation, OperationKind};
//! use video_edit_ffmpeg::{EncodeSettings, FfmpegEngine};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FfmpegEngine::new("ffmpeg", EncodeSettings::default());
//! let rotate = Operation::new(OperationKind::Rotate).with_param("angle", 90);
//! engine
//!     .apply(&rotate, Path::new("input.mp4"), Path::new("rotated.mp4"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod args;
mod probe;

pub use args::{build_args, AudioCodec, EncodeSettings, VideoCodec};
pub use probe::{parse_ffprobe_output, FfprobeProbe};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use video_edit_common::ProcessingError;
use video_edit_core::{MediaEngine, Operation};

/// Lines of ffmpeg stderr kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// [`MediaEngine`] backed by the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
    settings: EncodeSettings,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<PathBuf>, settings: EncodeSettings) -> Self {
        Self {
            binary: binary.into(),
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Whether the configured binary can be executed
    pub async fn is_available(&self) -> bool {
        let binary = self.binary.clone();
        tokio::task::spawn_blocking(move || {
            Command::new(binary)
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", EncodeSettings::default())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessingError> {
        if !input.exists() {
            return Err(ProcessingError::AssetNotFound(input.display().to_string()));
        }

        let args = build_args(operation, input, output, &self.settings)?;
        debug!(
            "{} {}",
            self.binary.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let binary = self.binary.clone();
        let result = tokio::task::spawn_blocking(move || Command::new(binary).args(args).output())
            .await
            .map_err(|e| ProcessingError::Other(format!("ffmpeg task panicked: {e}")))?
            .map_err(|e| ProcessingError::FFmpegError(format!("failed to execute ffmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ProcessingError::FFmpegError(format!(
                "{} exited with {}: {}",
                operation.kind,
                result.status,
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use video_edit_core::OperationKind;

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..30).map(|i| format!("line {i}\n\n")).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::default();
        let op = Operation::new(OperationKind::Denoise).with_param("intensity", 0.7);
        let err = engine
            .apply(&op, &dir.path().join("missing.mp4"), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::AssetNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"not a video").unwrap();
        let engine = FfmpegEngine::new(dir.path().join("no-such-ffmpeg"), EncodeSettings::default());
        assert!(!engine.is_available().await);

        let op = Operation::new(OperationKind::Rotate).with_param("angle", 90);
        let err = engine
            .apply(&op, &input, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::FFmpegError(_)));
    }
}
