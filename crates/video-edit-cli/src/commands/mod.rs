pub mod compile;
pub mod operations;
pub mod run;

use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::warn;
use video_edit_common::AssetMetadata;
use video_edit_core::MediaProbe;
use video_edit_ffmpeg::FfprobeProbe;
use video_edit_orchestrator::ServiceConfig;

/// Defaults, then the optional YAML file, then environment overrides
fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    ServiceConfig::load(path).context("Failed to load configuration")
}

/// Duration and frame size of `path`; unknown when ffprobe cannot read it
async fn probe_metadata(config: &ServiceConfig, path: &Path) -> AssetMetadata {
    let probe = FfprobeProbe::new(config.ffprobe_path.clone());
    match probe.probe(path).await {
        Ok(info) => AssetMetadata::from(&info),
        Err(e) => {
            warn!("Could not probe {}: {} (range checks against the asset are skipped)", path.display(), e);
            AssetMetadata::default()
        }
    }
}
