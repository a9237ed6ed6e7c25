//! Operation kinds, parameter values and operation requests

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// The closed set of transformations the pipeline knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Trim,
    Crop,
    Rotate,
    Resize,
    SpeedAdjust,
    BrightnessContrast,
    Upscale,
    Denoise,
    ColorCorrection,
    Stabilization,
    SuperResolution,
    MotionBlurRemoval,
}

/// Whether an operation is a structural edit or a quality enhancement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationCategory {
    Edit,
    Enhancement,
}

impl OperationKind {
    /// All kinds, in catalog order
    pub const ALL: [OperationKind; 12] = [
        Self::Trim,
        Self::Crop,
        Self::Rotate,
        Self::Resize,
        Self::SpeedAdjust,
        Self::BrightnessContrast,
        Self::Upscale,
        Self::Denoise,
        Self::ColorCorrection,
        Self::Stabilization,
        Self::SuperResolution,
        Self::MotionBlurRemoval,
    ];

    /// Wire name of the kind
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Crop => "crop",
            Self::Rotate => "rotate",
            Self::Resize => "resize",
            Self::SpeedAdjust => "speed_adjust",
            Self::BrightnessContrast => "brightness_contrast",
            Self::Upscale => "upscale",
            Self::Denoise => "denoise",
            Self::ColorCorrection => "color_correction",
            Self::Stabilization => "stabilization",
            Self::SuperResolution => "super_resolution",
            Self::MotionBlurRemoval => "motion_blur_removal",
        }
    }

    #[must_use]
    pub fn category(&self) -> OperationCategory {
        match self {
            Self::Trim
            | Self::Crop
            | Self::Rotate
            | Self::Resize
            | Self::SpeedAdjust
            | Self::BrightnessContrast => OperationCategory::Edit,
            Self::Upscale
            | Self::Denoise
            | Self::ColorCorrection
            | Self::Stabilization
            | Self::SuperResolution
            | Self::MotionBlurRemoval => OperationCategory::Enhancement,
        }
    }

    /// Operations whose quality depends on seeing the uncropped frame
    #[must_use]
    pub fn requires_full_frame(&self) -> bool {
        matches!(self, Self::Stabilization)
    }

    /// Position in [`OperationKind::ALL`]
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = CatalogError;

    /// Case-insensitive; `-` and spaces are folded to `_`, and common synonyms are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        if let Some(kind) = Self::ALL.iter().find(|k| k.name() == normalized) {
            return Ok(*kind);
        }

        let kind = match normalized.as_str() {
            "cut" | "clip" => Self::Trim,
            "rotation" => Self::Rotate,
            "scale" | "resolution" => Self::Resize,
            "speed" | "speed_change" | "playback_speed" => Self::SpeedAdjust,
            "color_adjust" | "brightness" | "contrast" => Self::BrightnessContrast,
            "upscaling" => Self::Upscale,
            "noise_reduction" | "denoising" => Self::Denoise,
            "colour_correction" | "color_grading" | "color" => Self::ColorCorrection,
            "stabilize" | "stabilise" | "stabilisation" => Self::Stabilization,
            "superresolution" | "sr" => Self::SuperResolution,
            "deblur" | "motion_blur" | "sharpen" => Self::MotionBlurRemoval,
            _ => return Err(CatalogError::UnknownOperationKind(s.to_string())),
        };
        Ok(kind)
    }
}

/// A typed parameter value
///
/// Deserialized untagged, so JSON `5` is an integer and `5.0` a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value (integers widen losslessly)
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view; floats qualify only when they have no fractional part
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    /// Convert a scalar JSON value; arrays, objects and null have no counterpart
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Parameter name to value, ordered by name
pub type Params = BTreeMap<String, ParamValue>;

/// One step of an editing sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    #[serde(default)]
    pub params: Params,
    /// Why the step was chosen; only set for steps derived from an instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Operation {
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            params: Params::new(),
            rationale: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(ParamValue::as_f64)
    }

    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(ParamValue::as_i64)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

/// An operation as supplied by a client, before it is checked against the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    #[serde(alias = "type", alias = "operation_type")]
    pub kind: String,
    #[serde(default, alias = "parameters")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl OperationRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}
