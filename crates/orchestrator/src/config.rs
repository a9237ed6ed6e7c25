//! Service configuration
//!
//! Defaults, optionally overlaid by a YAML file, then by environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use video_edit_ffmpeg::EncodeSettings;
use video_edit_interpreter::InterpreterConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where uploaded assets are stored
    pub upload_dir: PathBuf,
    /// Where final outputs are written
    pub output_dir: PathBuf,
    /// Parent of the per-task intermediate directories
    pub work_dir: PathBuf,
    pub max_upload_mb: u64,
    /// Accepted container extensions, lowercase
    pub supported_formats: Vec<String>,
    pub workers: usize,
    pub queue_capacity: usize,
    pub task_timeout_secs: u64,
    pub keep_intermediates: bool,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub encode: EncodeSettings,
    pub interpreter: InterpreterConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./data/temp_videos"),
            output_dir: PathBuf::from("./data/output_videos"),
            work_dir: PathBuf::from("./data/work"),
            max_upload_mb: 500,
            supported_formats: ["mp4", "avi", "mov", "mkv", "flv"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            workers: 2,
            queue_capacity: 64,
            task_timeout_secs: 30 * 60,
            keep_intermediates: false,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            encode: EncodeSettings::default(),
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Optional file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from variables returned by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("VIDEO_EDIT_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("VIDEO_EDIT_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("VIDEO_EDIT_WORK_DIR") {
            self.work_dir = PathBuf::from(v);
        }
        if let Some(v) = get("VIDEO_EDIT_WORKERS") {
            self.workers = parse("VIDEO_EDIT_WORKERS", &v)?;
        }
        if let Some(v) = get("VIDEO_EDIT_QUEUE_CAPACITY") {
            self.queue_capacity = parse("VIDEO_EDIT_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = get("VIDEO_EDIT_TASK_TIMEOUT_SECS") {
            self.task_timeout_secs = parse("VIDEO_EDIT_TASK_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("VIDEO_EDIT_MAX_UPLOAD_MB") {
            self.max_upload_mb = parse("VIDEO_EDIT_MAX_UPLOAD_MB", &v)?;
        }
        if let Some(v) = get("VIDEO_EDIT_INTERPRETER") {
            self.interpreter.backend = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VIDEO_EDIT_INTERPRETER".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("FFMPEG_PATH") {
            self.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = get("FFPROBE_PATH") {
            self.ffprobe_path = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(invalid("workers", "0"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "0"));
        }
        if self.task_timeout_secs == 0 {
            return Err(invalid("task_timeout_secs", "0"));
        }
        if self.supported_formats.is_empty() {
            return Err(invalid("supported_formats", "[]"));
        }
        Ok(())
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use video_edit_interpreter::InterpreterBackend;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_upload_bytes(), 500 * 1024 * 1024);
        assert_eq!(config.task_timeout(), Duration::from_secs(1800));
        assert_eq!(config.supported_formats, ["mp4", "avi", "mov", "mkv", "flv"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_overlay_keeps_unset_defaults() {
        let config = ServiceConfig::from_yaml_str(
            "workers: 4\noutput_dir: /srv/out\nencode:\n  crf: 18\ninterpreter:\n  backend: keyword\n",
        )
        .unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.encode.crf, 18);
        assert_eq!(config.encode.preset, "medium");
        assert_eq!(config.interpreter.backend, InterpreterBackend::Keyword);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VIDEO_EDIT_WORKERS", "3"),
            ("VIDEO_EDIT_TASK_TIMEOUT_SECS", "60"),
            ("VIDEO_EDIT_INTERPRETER", "gemini"),
            ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
            ("VIDEO_EDIT_OUTPUT_DIR", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.task_timeout_secs, 60);
        assert_eq!(config.interpreter.backend, InterpreterBackend::Gemini);
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        // Blank values are ignored
        assert_eq!(config.output_dir, PathBuf::from("./data/output_videos"));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(|key| (key == "VIDEO_EDIT_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ServiceConfig {
            workers: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
