/// Common types shared by the video editing crates
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("FFmpeg error: {0}")]
    FFmpegError(String),

    #[error("FFprobe error: {0}")]
    FFprobeError(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Stream type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
}

/// Information about a media stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamInfo {
    pub stream_type: StreamType,
    pub codec: String,
    pub bitrate: u64,

    // Video-specific fields
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,

    // Audio-specific fields
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

/// Complete media file information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub format: String,
    pub duration: f64,
    pub streams: Vec<StreamInfo>,
    pub metadata: HashMap<String, String>,
}

impl MediaInfo {
    /// Find the first video stream
    #[must_use]
    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.stream_type == StreamType::Video)
    }

    /// Find the first audio stream
    #[must_use]
    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.stream_type == StreamType::Audio)
    }

    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio_stream().is_some()
    }

    /// Width and height of the first video stream, when both are known
    #[must_use]
    pub fn resolution(&self) -> Option<(u32, u32)> {
        let video = self.video_stream()?;
        Some((video.width?, video.height?))
    }
}

/// Unique identifier of an uploaded asset
///
/// Built from the upload timestamp (millisecond precision) and the sanitized
/// original filename, so it doubles as the on-disk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier for a file uploaded at `uploaded_at`
    #[must_use]
    pub fn from_upload(filename: &str, uploaded_at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}_{}",
            uploaded_at.format("%Y%m%d_%H%M%S_%3f"),
            sanitize_filename(filename)
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Reduce a client-supplied filename to a safe single path component
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    // Only the final component counts; clients may send full paths
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased file extension, if any
#[must_use]
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// A stored video file
///
/// Assets are immutable; downstream steps only read from `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub path: PathBuf,
    /// Container format derived from the file extension (e.g. "mp4")
    pub format: String,
    pub size_bytes: u64,
}

/// What the pipeline knows about an asset before processing it
///
/// Every field is optional: checks that need a missing value are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl AssetMetadata {
    #[must_use]
    pub fn resolution(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }
}

impl From<&MediaInfo> for AssetMetadata {
    fn from(info: &MediaInfo) -> Self {
        let (width, height) = match info.resolution() {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        Self {
            duration_secs: (info.duration > 0.0).then_some(info.duration),
            width,
            height,
        }
    }
}
