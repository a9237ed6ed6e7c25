//! Translation of catalog operations into ffmpeg command lines
//!
//! Every operation becomes one ffmpeg invocation. Picture operations are a
//! single `-vf` filter chain; audio is copied unless the operation changes
//! timing, in which case it is re-encoded so it stays in sync.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use video_edit_common::ProcessingError;
use video_edit_core::{Operation, OperationKind};

/// Supported video codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264/AVC - widely compatible
    #[default]
    H264,
    /// H.265/HEVC - smaller files, slower encode
    H265,
    /// VP9 - for WebM outputs
    Vp9,
}

impl VideoCodec {
    fn to_ffmpeg_str(self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::H265 => "libx265",
            VideoCodec::Vp9 => "libvpx-vp9",
        }
    }
}

/// Audio codec used when an operation forces an audio re-encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Aac,
    Opus,
}

impl AudioCodec {
    fn to_ffmpeg_str(self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Opus => "libopus",
        }
    }
}

/// Encoder settings applied to every step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub video_codec: VideoCodec,
    /// Constant Rate Factor (lower = better quality)
    pub crf: u32,
    /// Encoder speed/quality preset for x264/x265
    pub preset: String,
    pub audio_codec: AudioCodec,
    pub audio_bitrate: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: VideoCodec::H264,
            crf: 20,
            preset: "medium".to_string(),
            audio_codec: AudioCodec::Aac,
            audio_bitrate: "192k".to_string(),
        }
    }
}

/// How a single operation is expressed for ffmpeg
#[derive(Debug, Clone, PartialEq)]
struct Plan {
    /// Options placed before `-i`
    input_options: Vec<String>,
    video_filter: Option<String>,
    audio_filter: Option<String>,
    reencode_audio: bool,
    /// Remux without touching any stream
    stream_copy: bool,
}

impl Plan {
    fn video(filter: String) -> Self {
        Self {
            input_options: Vec::new(),
            video_filter: Some(filter),
            audio_filter: None,
            reencode_audio: false,
            stream_copy: false,
        }
    }

    fn copy() -> Self {
        Self {
            input_options: Vec::new(),
            video_filter: None,
            audio_filter: None,
            reencode_audio: false,
            stream_copy: true,
        }
    }
}

/// Build the full ffmpeg argument list for one operation
///
/// Pure: no file system access, so the mapping can be tested without ffmpeg.
pub fn build_args(
    operation: &Operation,
    input: &Path,
    output: &Path,
    settings: &EncodeSettings,
) -> Result<Vec<OsString>, ProcessingError> {
    let plan = plan(operation)?;

    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
        .iter()
        .map(OsString::from)
        .collect();
    args.extend(plan.input_options.iter().map(OsString::from));
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());

    if plan.stream_copy {
        args.extend(["-c", "copy"].iter().map(OsString::from));
        args.push(output.as_os_str().to_owned());
        return Ok(args);
    }

    if let Some(filter) = &plan.video_filter {
        args.push("-vf".into());
        args.push(filter.into());
    }
    args.push("-c:v".into());
    args.push(settings.video_codec.to_ffmpeg_str().into());
    args.push("-crf".into());
    args.push(settings.crf.to_string().into());
    match settings.video_codec {
        VideoCodec::H264 | VideoCodec::H265 => {
            args.push("-preset".into());
            args.push(settings.preset.as_str().into());
            // Players reject 4:4:4 and 10-bit H.264 more often than not
            args.push("-pix_fmt".into());
            args.push("yuv420p".into());
        }
        VideoCodec::Vp9 => {
            args.push("-b:v".into());
            args.push("0".into());
        }
    }

    if let Some(filter) = &plan.audio_filter {
        args.push("-af".into());
        args.push(filter.into());
    }
    if plan.reencode_audio {
        args.push("-c:a".into());
        args.push(settings.audio_codec.to_ffmpeg_str().into());
        args.push("-b:a".into());
        args.push(settings.audio_bitrate.as_str().into());
    } else {
        args.push("-c:a".into());
        args.push("copy".into());
    }

    args.push(output.as_os_str().to_owned());
    Ok(args)
}

fn plan(operation: &Operation) -> Result<Plan, ProcessingError> {
    let plan = match operation.kind {
        OperationKind::Trim => {
            let mut input_options = Vec::new();
            if let Some(start) = operation.float("start_time") {
                input_options.push("-ss".to_string());
                input_options.push(num(start));
            }
            if let Some(end) = operation.float("end_time") {
                input_options.push("-to".to_string());
                input_options.push(num(end));
            }
            if input_options.is_empty() {
                return Err(missing(operation, "start_time or end_time"));
            }
            Plan {
                input_options,
                video_filter: None,
                audio_filter: None,
                reencode_audio: true,
                stream_copy: false,
            }
        }
        OperationKind::Crop => {
            let width = int(operation, "width")?;
            let height = int(operation, "height")?;
            let x = operation.int("x").unwrap_or(0);
            let y = operation.int("y").unwrap_or(0);
            Plan::video(format!("crop={width}:{height}:{x}:{y}"))
        }
        OperationKind::Rotate => match int(operation, "angle")? {
            0 => Plan::copy(),
            90 => Plan::video("transpose=clock".to_string()),
            180 => Plan::video("hflip,vflip".to_string()),
            270 => Plan::video("transpose=cclock".to_string()),
            other => {
                return Err(ProcessingError::Other(format!(
                    "rotate: unsupported angle {other}"
                )))
            }
        },
        OperationKind::Resize => {
            let width = operation.int("width");
            let height = operation.int("height");
            if width.is_none() && height.is_none() {
                return Err(missing(operation, "width or height"));
            }
            // -2 keeps the aspect ratio and rounds to an even size for yuv420p
            let w = width.map_or_else(|| "-2".to_string(), |w| w.to_string());
            let h = height.map_or_else(|| "-2".to_string(), |h| h.to_string());
            Plan::video(format!("scale={w}:{h}"))
        }
        OperationKind::SpeedAdjust => {
            let speed = float(operation, "speed")?;
            Plan {
                input_options: Vec::new(),
                video_filter: Some(format!("setpts=PTS/{}", num(speed))),
                audio_filter: Some(format!("atempo={}", num(speed))),
                reencode_audio: true,
                stream_copy: false,
            }
        }
        OperationKind::BrightnessContrast => {
            let brightness = operation.float("brightness").unwrap_or(0.0);
            let contrast = operation.float("contrast").unwrap_or(0.0);
            Plan::video(format!(
                "eq=brightness={}:contrast={}",
                num(brightness),
                num(1.0 + contrast)
            ))
        }
        OperationKind::Upscale => {
            let factor = float(operation, "factor")?;
            Plan::video(scale_by(factor))
        }
        OperationKind::Denoise => {
            let intensity = float(operation, "intensity")?;
            let spatial = 1.0 + intensity * 9.0;
            let temporal = spatial * 1.5;
            Plan::video(format!(
                "hqdn3d={}:{}:{}:{}",
                num(spatial),
                num(spatial * 0.75),
                num(temporal),
                num(temporal * 0.75)
            ))
        }
        OperationKind::ColorCorrection => {
            let intensity = float(operation, "intensity")?;
            let saturation = operation.float("saturation").unwrap_or(1.0);
            Plan::video(format!(
                "normalize=strength={},eq=saturation={}",
                num(intensity),
                num(saturation)
            ))
        }
        OperationKind::Stabilization => {
            let radius = int(operation, "radius")?;
            Plan::video(format!("deshake=rx={radius}:ry={radius}"))
        }
        OperationKind::SuperResolution => {
            let factor = int(operation, "factor")?;
            Plan::video(format!(
                "{},unsharp=5:5:0.8:5:5:0.0",
                scale_by(factor as f64)
            ))
        }
        OperationKind::MotionBlurRemoval => {
            let intensity = float(operation, "intensity")?;
            Plan::video(format!("unsharp=5:5:{}:3:3:0.0", num(intensity * 2.0)))
        }
    };
    Ok(plan)
}

fn scale_by(factor: f64) -> String {
    let f = num(factor);
    format!("scale=trunc(iw*{f}/2)*2:trunc(ih*{f}/2)*2:flags=lanczos")
}

fn float(operation: &Operation, name: &str) -> Result<f64, ProcessingError> {
    operation.float(name).ok_or_else(|| missing(operation, name))
}

fn int(operation: &Operation, name: &str) -> Result<i64, ProcessingError> {
    operation.int(name).ok_or_else(|| missing(operation, name))
}

fn missing(operation: &Operation, name: &str) -> ProcessingError {
    ProcessingError::Other(format!("{}: missing parameter {}", operation.kind, name))
}

/// Shortest decimal form, so identical operations give identical command lines
fn num(value: f64) -> String {
    let s = format!("{value:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
