//! Operation catalog: parameter schemas, ranges and defaults for every kind
//!
//! The catalog is static data. Both the instruction compiler and the
//! validator consult it, so a kind or parameter exists only if it is listed here.

use serde::Serialize;

use crate::error::CatalogError;
use crate::operation::{Operation, OperationCategory, OperationKind, ParamValue, Params};

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Float,
}

impl ParamType {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
        }
    }
}

/// Schema of one parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Exhaustive set of accepted values; empty means any value in range
    pub allowed: &'static [i64],
    default: Option<f64>,
    pub description: &'static str,
}

impl ParamSpec {
    const fn new(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: false,
            min: None,
            max: None,
            allowed: &[],
            default: None,
            description,
        }
    }

    const fn float(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Float, description)
    }

    const fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn at_least(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    const fn one_of(mut self, allowed: &'static [i64]) -> Self {
        self.allowed = allowed;
        self
    }

    const fn default_to(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    /// Default value in the parameter's declared type
    #[must_use]
    pub fn default_value(&self) -> Option<ParamValue> {
        self.default.map(|d| match self.param_type {
            ParamType::Integer => ParamValue::Int(d as i64),
            ParamType::Float => ParamValue::Float(d),
        })
    }

    /// Lossless conversion of a value to the declared type
    ///
    /// Integers widen to floats; floats narrow to integers only when whole.
    pub fn coerce(&self, value: &ParamValue) -> Result<ParamValue, String> {
        let coerced = match self.param_type {
            ParamType::Float => value.as_f64().map(ParamValue::Float),
            ParamType::Integer => value.as_i64().map(ParamValue::Int),
        };
        coerced.ok_or_else(|| {
            format!(
                "expected {}, got {} {}",
                self.param_type.name(),
                value.type_name(),
                value
            )
        })
    }

    /// Like [`ParamSpec::coerce`], but also parses numeric text such as `"10"` or `" 2.5 "`
    pub fn coerce_lenient(&self, value: &ParamValue) -> Result<ParamValue, String> {
        match value {
            ParamValue::Text(text) => {
                let trimmed = text.trim();
                let parsed = trimmed
                    .parse::<i64>()
                    .map(ParamValue::Int)
                    .or_else(|_| trimmed.parse::<f64>().map(ParamValue::Float))
                    .map_err(|_| format!("cannot read {text:?} as a number"))?;
                self.coerce(&parsed)
            }
            other => self.coerce(other),
        }
    }

    /// Check an already-coerced value against the declared range and allowed set
    pub fn check_range(&self, value: &ParamValue) -> Result<(), String> {
        if !self.allowed.is_empty() {
            let accepted = value.as_i64().is_some_and(|v| self.allowed.contains(&v));
            if !accepted {
                let allowed: Vec<String> = self.allowed.iter().map(ToString::to_string).collect();
                return Err(format!("{value} is not one of {}", allowed.join(", ")));
            }
        }

        let Some(v) = value.as_f64() else {
            return Ok(());
        };
        if !v.is_finite() {
            return Err(format!("{value} is not a finite number"));
        }
        match (self.min, self.max) {
            (Some(min), Some(max)) if v < min || v > max => {
                Err(format!("{value} is outside [{min}, {max}]"))
            }
            (Some(min), None) if v < min => Err(format!("{value} is below the minimum {min}")),
            (None, Some(max)) if v > max => Err(format!("{value} is above the maximum {max}")),
            _ => Ok(()),
        }
    }
}

/// Schema of one operation kind
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    /// At least one of these optional parameters must be present
    pub requires_any: &'static [&'static str],
}

impl OperationSpec {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        let params: &'static [ParamSpec] = self.params;
        params.iter().find(|p| p.name == name)
    }

    /// Required parameters absent from `params`, including an unmet `requires_any` group
    #[must_use]
    pub fn missing_required(&self, params: &Params) -> Vec<String> {
        let mut missing: Vec<String> = self
            .params
            .iter()
            .filter(|p| p.required && !params.contains_key(p.name))
            .map(|p| p.name.to_string())
            .collect();

        if !self.requires_any.is_empty()
            && !self.requires_any.iter().any(|name| params.contains_key(*name))
        {
            missing.push(self.requires_any.join(" or "));
        }
        missing
    }

    /// Insert defaults for optional parameters that are absent
    pub fn fill_defaults(&self, params: &mut Params) {
        for spec in self.params {
            if params.contains_key(spec.name) {
                continue;
            }
            if let Some(default) = spec.default_value() {
                params.insert(spec.name.to_string(), default);
            }
        }
    }
}

const TRIM_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("start_time", "Start of the kept segment, in seconds").at_least(0.0),
    ParamSpec::float("end_time", "End of the kept segment, in seconds").at_least(0.0),
];

const CROP_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("x", "Left edge of the crop rectangle, in pixels")
        .range(0.0, 7680.0)
        .default_to(0.0),
    ParamSpec::integer("y", "Top edge of the crop rectangle, in pixels")
        .range(0.0, 4320.0)
        .default_to(0.0),
    ParamSpec::integer("width", "Crop width, in pixels")
        .required()
        .at_least(1.0),
    ParamSpec::integer("height", "Crop height, in pixels")
        .required()
        .at_least(1.0),
];

const ROTATE_PARAMS: &[ParamSpec] = &[ParamSpec::integer("angle", "Clockwise rotation, in degrees")
    .required()
    .one_of(&[0, 90, 180, 270])];

const RESIZE_PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("width", "Target width; aspect ratio is kept when omitted").range(1.0, 7680.0),
    ParamSpec::integer("height", "Target height; aspect ratio is kept when omitted").range(1.0, 4320.0),
];

const SPEED_PARAMS: &[ParamSpec] = &[ParamSpec::float("speed", "Playback speed multiplier")
    .required()
    .range(0.5, 2.0)];

const BRIGHTNESS_CONTRAST_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("brightness", "Brightness offset")
        .range(-1.0, 1.0)
        .default_to(0.0),
    ParamSpec::float("contrast", "Contrast offset")
        .range(-1.0, 1.0)
        .default_to(0.0),
];

const UPSCALE_PARAMS: &[ParamSpec] = &[ParamSpec::float("factor", "Scale multiplier")
    .range(1.0, 4.0)
    .default_to(2.0)];

const DENOISE_PARAMS: &[ParamSpec] = &[ParamSpec::float("intensity", "Filter strength")
    .range(0.0, 1.0)
    .default_to(0.7)];

const COLOR_CORRECTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("intensity", "Correction strength")
        .range(0.0, 1.0)
        .default_to(0.7),
    ParamSpec::float("saturation", "Saturation multiplier")
        .range(0.0, 3.0)
        .default_to(1.0),
];

const STABILIZATION_PARAMS: &[ParamSpec] = &[ParamSpec::integer(
    "radius",
    "Motion search radius, in pixels",
)
.range(1.0, 64.0)
.default_to(16.0)];

const SUPER_RESOLUTION_PARAMS: &[ParamSpec] = &[ParamSpec::integer("factor", "Scale multiplier")
    .one_of(&[2, 3, 4])
    .default_to(2.0)];

const MOTION_BLUR_PARAMS: &[ParamSpec] = &[ParamSpec::float("intensity", "Sharpening strength")
    .range(0.0, 1.0)
    .default_to(0.7)];

/// One entry per kind, in [`OperationKind::ALL`] order
static STANDARD_SPECS: [OperationSpec; 12] = [
    OperationSpec {
        kind: OperationKind::Trim,
        description: "Keep only the segment between start_time and end_time",
        params: TRIM_PARAMS,
        requires_any: &["start_time", "end_time"],
    },
    OperationSpec {
        kind: OperationKind::Crop,
        description: "Cut a rectangle out of every frame",
        params: CROP_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::Rotate,
        description: "Rotate the picture clockwise by a multiple of 90 degrees",
        params: ROTATE_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::Resize,
        description: "Scale the picture to a target resolution",
        params: RESIZE_PARAMS,
        requires_any: &["width", "height"],
    },
    OperationSpec {
        kind: OperationKind::SpeedAdjust,
        description: "Speed up or slow down playback",
        params: SPEED_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::BrightnessContrast,
        description: "Adjust brightness and contrast",
        params: BRIGHTNESS_CONTRAST_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::Upscale,
        description: "Increase resolution with high-quality resampling",
        params: UPSCALE_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::Denoise,
        description: "Reduce grain and sensor noise",
        params: DENOISE_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::ColorCorrection,
        description: "Correct color balance and saturation",
        params: COLOR_CORRECTION_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::Stabilization,
        description: "Remove camera shake",
        params: STABILIZATION_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::SuperResolution,
        description: "Reconstruct detail while increasing resolution",
        params: SUPER_RESOLUTION_PARAMS,
        requires_any: &[],
    },
    OperationSpec {
        kind: OperationKind::MotionBlurRemoval,
        description: "Sharpen motion-blurred frames",
        params: MOTION_BLUR_PARAMS,
        requires_any: &[],
    },
];

fn is_empty_slice<T>(values: &&'static [T]) -> bool {
    values.is_empty()
}

/// Serializable description of an operation kind, for clients
#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub category: OperationCategory,
    pub description: &'static str,
    pub parameters: Vec<ParamDescriptor>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub requires_any: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub allowed: &'static [i64],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    pub description: &'static str,
}

impl From<&ParamSpec> for ParamDescriptor {
    fn from(spec: &ParamSpec) -> Self {
        Self {
            name: spec.name,
            param_type: spec.param_type,
            required: spec.required,
            min: spec.min,
            max: spec.max,
            allowed: spec.allowed,
            default: spec.default_value(),
            description: spec.description,
        }
    }
}

/// Read-only registry of operation schemas
#[derive(Debug, Clone, Copy)]
pub struct OperationCatalog {
    specs: &'static [OperationSpec; 12],
}

impl OperationCatalog {
    /// The built-in catalog
    #[must_use]
    pub fn standard() -> Self {
        Self {
            specs: &STANDARD_SPECS,
        }
    }

    #[must_use]
    pub fn spec(&self, kind: OperationKind) -> &'static OperationSpec {
        let specs: &'static [OperationSpec; 12] = self.specs;
        &specs[kind.index()]
    }

    /// Resolve a kind name (aliases included) to its schema
    pub fn lookup(&self, name: &str) -> Result<&'static OperationSpec, CatalogError> {
        let kind: OperationKind = name.parse()?;
        Ok(self.spec(kind))
    }

    pub fn specs(&self) -> impl Iterator<Item = &'static OperationSpec> {
        let specs: &'static [OperationSpec; 12] = self.specs;
        specs.iter()
    }

    /// Wire names of every kind, in catalog order
    #[must_use]
    pub fn kind_names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.kind.name()).collect()
    }

    #[must_use]
    pub fn describe(&self) -> Vec<OperationDescriptor> {
        self.specs
            .iter()
            .map(|spec| OperationDescriptor {
                kind: spec.kind,
                category: spec.kind.category(),
                description: spec.description,
                parameters: spec.params.iter().map(ParamDescriptor::from).collect(),
                requires_any: spec.requires_any,
            })
            .collect()
    }

    /// Fill absent optional parameters of `operation` with catalog defaults
    pub fn fill_defaults(&self, operation: &mut Operation) {
        self.spec(operation.kind).fill_defaults(&mut operation.params);
    }
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
