//! Media probing via ffprobe

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use video_edit_common::{MediaInfo, ProcessingError, StreamInfo, StreamType};
use video_edit_core::MediaProbe;

/// [`MediaProbe`] backed by the `ffprobe` binary
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProcessingError> {
        if !path.exists() {
            return Err(ProcessingError::AssetNotFound(path.display().to_string()));
        }
        debug!("Probing {}", path.display());

        let binary = self.binary.clone();
        let path = path.to_path_buf();
        let output = tokio::task::spawn_blocking(move || {
            Command::new(&binary)
                .args([
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_format",
                    "-show_streams",
                ])
                .arg(&path)
                .output()
        })
        .await
        .map_err(|e| ProcessingError::Other(format!("ffprobe task panicked: {e}")))?
        .map_err(|e| ProcessingError::FFprobeError(format!("failed to execute ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::CorruptedFile(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    tags: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u8>,
    bit_rate: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output
pub fn parse_ffprobe_output(json: &str) -> Result<MediaInfo, ProcessingError> {
    let parsed: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProcessingError::FFprobeError(format!("failed to parse JSON: {e}")))?;

    let streams: Vec<StreamInfo> = parsed.streams.iter().filter_map(parse_stream).collect();

    let format = parsed.format.as_ref();
    // Some containers only report duration per stream
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            parsed
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref()?.parse::<f64>().ok())
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    Ok(MediaInfo {
        format: format
            .and_then(|f| f.format_name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        duration,
        streams,
        metadata: format.and_then(|f| f.tags.clone()).unwrap_or_default(),
    })
}

fn parse_stream(stream: &FfprobeStream) -> Option<StreamInfo> {
    let stream_type = match stream.codec_type.as_deref()? {
        "video" => StreamType::Video,
        "audio" => StreamType::Audio,
        "subtitle" => StreamType::Subtitle,
        _ => return None,
    };
    Some(StreamInfo {
        stream_type,
        codec: stream.codec_name.clone().unwrap_or_default(),
        bitrate: stream
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse().ok())
            .unwrap_or(0),
        width: stream.width,
        height: stream.height,
        fps: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
        channels: stream.channels,
    })
}

/// Parse "30000/1001" or "25"
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}
