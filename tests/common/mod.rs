//! Shared fixtures for the end-to-end tests
//!
//! Assets are small JSON files describing a clip (duration and frame size).
//! [`SimulatedEngine`] applies each operation to that description instead of
//! to real video, and [`SimulatedProbe`] reads it back, so whole pipelines can
//! be checked without ffmpeg.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use video_edit_pipeline::video_edit_common::{MediaInfo, StreamInfo, StreamType};
use video_edit_pipeline::video_edit_core::{MediaEngine, MediaProbe};
use video_edit_pipeline::video_edit_orchestrator::LocalAssetStore;
use video_edit_pipeline::{
    AssetId, EditService, Operation, OperationKind, ProcessingError, ServiceConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipDescription {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl ClipDescription {
    pub fn read(path: &Path) -> Result<Self, ProcessingError> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| ProcessingError::CorruptedFile(e.to_string()))
    }

    fn apply(mut self, op: &Operation) -> Self {
        let scale = |v: u32, f: f64| ((f64::from(v) * f / 2.0).trunc() * 2.0) as u32;
        match op.kind {
            OperationKind::Trim => {
                let start = op.float("start_time").unwrap_or(0.0);
                let end = op.float("end_time").unwrap_or(self.duration);
                self.duration = end - start;
            }
            OperationKind::Crop => {
                self.width = op.int("width").unwrap_or(i64::from(self.width)) as u32;
                self.height = op.int("height").unwrap_or(i64::from(self.height)) as u32;
            }
            OperationKind::Rotate => {
                if matches!(op.int("angle"), Some(90 | 270)) {
                    std::mem::swap(&mut self.width, &mut self.height);
                }
            }
            OperationKind::Resize => {
                self.width = op.int("width").map_or(self.width, |w| w as u32);
                self.height = op.int("height").map_or(self.height, |h| h as u32);
            }
            OperationKind::SpeedAdjust => {
                self.duration /= op.float("speed").unwrap_or(1.0);
            }
            OperationKind::Upscale | OperationKind::SuperResolution => {
                let factor = op.float("factor").unwrap_or(2.0);
                self.width = scale(self.width, factor);
                self.height = scale(self.height, factor);
            }
            _ => {}
        }
        self
    }
}

/// Applies operations to JSON clip descriptions
#[derive(Default)]
pub struct SimulatedEngine {
    /// Time spent in every operation
    pub delay: Duration,
    /// Operation kind that fails instead of producing output
    pub fail_on: Option<OperationKind>,
    /// Operation kind that panics inside the engine
    pub panic_on: Option<OperationKind>,
    /// Kinds applied so far, in order
    pub applied: Mutex<Vec<OperationKind>>,
}

impl SimulatedEngine {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing_on(kind: OperationKind) -> Self {
        Self {
            fail_on: Some(kind),
            ..Self::default()
        }
    }

    pub fn panicking_on(kind: OperationKind) -> Self {
        Self {
            panic_on: Some(kind),
            ..Self::default()
        }
    }

    pub fn applied(&self) -> Vec<OperationKind> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessingError> {
        tokio::time::sleep(self.delay).await;
        if self.panic_on == Some(operation.kind) {
            panic!("simulated engine bug in {}", operation.kind);
        }
        if self.fail_on == Some(operation.kind) {
            return Err(ProcessingError::FFmpegError(format!(
                "simulated failure in {}",
                operation.kind
            )));
        }
        let clip = ClipDescription::read(input)?.apply(operation);
        let json = serde_json::to_vec(&clip).map_err(|e| ProcessingError::Other(e.to_string()))?;
        tokio::fs::write(output, json).await?;
        self.applied.lock().unwrap().push(operation.kind);
        Ok(())
    }
}

/// Reads clip descriptions back as media info
pub struct SimulatedProbe;

#[async_trait]
impl MediaProbe for SimulatedProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProcessingError> {
        let clip = ClipDescription::read(path)?;
        Ok(MediaInfo {
            format: "mp4".to_string(),
            duration: clip.duration,
            streams: vec![StreamInfo {
                stream_type: StreamType::Video,
                codec: "h264".to_string(),
                bitrate: 0,
                width: Some(clip.width),
                height: Some(clip.height),
                fps: Some(30.0),
                sample_rate: None,
                channels: None,
            }],
            metadata: HashMap::new(),
        })
    }
}

/// A running service over temporary directories
pub struct Harness {
    pub service: EditService,
    pub engine: Arc<SimulatedEngine>,
    pub store: Arc<LocalAssetStore>,
    pub dir: TempDir,
}

impl Harness {
    pub fn start(engine: SimulatedEngine) -> Self {
        Self::start_with(engine, |_| {})
    }

    pub fn start_with(engine: SimulatedEngine, configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig {
            upload_dir: dir.path().join("uploads"),
            output_dir: dir.path().join("outputs"),
            work_dir: dir.path().join("work"),
            workers: 1,
            ..ServiceConfig::default()
        };
        config.interpreter.backend = "keyword".parse().unwrap();
        configure(&mut config);

        let engine = Arc::new(engine);
        let store = Arc::new(LocalAssetStore::from_config(&config));
        let service = EditService::builder(config)
            .engine(engine.clone())
            .probe(Arc::new(SimulatedProbe))
            .asset_store(store.clone())
            .build()
            .unwrap();

        Self {
            service,
            engine,
            store,
            dir,
        }
    }

    /// Store a clip description as a new asset
    pub async fn upload(&self, duration: f64, width: u32, height: u32) -> AssetId {
        let clip = ClipDescription {
            duration,
            width,
            height,
        };
        let bytes = serde_json::to_vec(&clip).unwrap();
        self.store.save("clip.mp4", &bytes).await.unwrap().id
    }
}
