//! Operation sequence validation
//!
//! Checks every operation against the catalog, then walks the sequence while
//! tracking the asset's duration and frame size so that each step is judged
//! against the asset as it will look when that step runs.

use serde::Serialize;
use tracing::{debug, warn};
use video_edit_common::AssetMetadata;

use crate::catalog::OperationCatalog;
use crate::error::{ValidationError, ValidationIssue};
use crate::operation::{Operation, OperationKind, OperationRequest, ParamValue, Params};

/// Slack allowed when comparing trim bounds to a probed duration
const DURATION_TOLERANCE_SECS: f64 = 1e-3;

/// Largest frame the pipeline will produce
const MAX_OUTPUT_WIDTH: u32 = 7680;
const MAX_OUTPUT_HEIGHT: u32 = 4320;

/// Non-fatal finding attached to an accepted sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    pub index: usize,
    pub kind: OperationKind,
    pub message: String,
}

/// A sequence that passed validation, with coercions and defaults applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedSequence {
    pub operations: Vec<Operation>,
    pub warnings: Vec<ValidationWarning>,
}

/// Asset shape as it evolves through the sequence
#[derive(Debug, Clone, Copy, Default)]
struct TrackedAsset {
    duration: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    cropped: bool,
}

impl From<&AssetMetadata> for TrackedAsset {
    fn from(meta: &AssetMetadata) -> Self {
        Self {
            duration: meta.duration_secs,
            width: meta.width,
            height: meta.height,
            cropped: false,
        }
    }
}

/// Stateless validator over a catalog
#[derive(Debug, Clone, Default)]
pub struct OperationValidator {
    catalog: OperationCatalog,
}

impl OperationValidator {
    #[must_use]
    pub fn new(catalog: OperationCatalog) -> Self {
        Self { catalog }
    }

    /// Validate typed operations against the asset's metadata
    ///
    /// Pure: the same inputs always give the same verdict.
    pub fn validate(
        &self,
        operations: &[Operation],
        metadata: &AssetMetadata,
    ) -> Result<ValidatedSequence, ValidationError> {
        let resolved: Vec<Option<Operation>> = operations.iter().cloned().map(Some).collect();
        self.run(resolved, Vec::new(), metadata)
    }

    /// Resolve raw client requests against the catalog, then validate them
    pub fn validate_requests(
        &self,
        requests: &[OperationRequest],
        metadata: &AssetMetadata,
    ) -> Result<ValidatedSequence, ValidationError> {
        let mut issues = Vec::new();
        let resolved = requests
            .iter()
            .enumerate()
            .map(|(index, request)| self.resolve(index, request, &mut issues))
            .collect();
        self.run(resolved, issues, metadata)
    }

    fn resolve(
        &self,
        index: usize,
        request: &OperationRequest,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Operation> {
        let spec = match self.catalog.lookup(&request.kind) {
            Ok(spec) => spec,
            Err(_) => {
                issues.push(ValidationIssue::UnknownOperationKind {
                    index,
                    kind: request.kind.clone(),
                });
                return None;
            }
        };

        let mut operation = Operation::new(spec.kind);
        let mut ok = true;
        for (name, value) in &request.params {
            match ParamValue::from_json(value) {
                Some(value) => {
                    operation.params.insert(name.clone(), value);
                }
                None => {
                    ok = false;
                    issues.push(ValidationIssue::InvalidParameter {
                        index,
                        kind: spec.kind,
                        parameter: name.clone(),
                        reason: format!("expected a scalar value, got {value}"),
                    });
                }
            }
        }
        ok.then_some(operation)
    }

    fn run(
        &self,
        resolved: Vec<Option<Operation>>,
        mut issues: Vec<ValidationIssue>,
        metadata: &AssetMetadata,
    ) -> Result<ValidatedSequence, ValidationError> {
        if resolved.is_empty() {
            return Err(ValidationError {
                issues: vec![ValidationIssue::EmptySequence],
            });
        }

        let mut state = TrackedAsset::from(metadata);
        let mut operations = Vec::with_capacity(resolved.len());
        let mut warnings = Vec::new();

        for (index, candidate) in resolved.into_iter().enumerate() {
            let Some(operation) = candidate else {
                // Shape after an unresolved step is unknown
                state = TrackedAsset::default();
                continue;
            };

            let before = issues.len();
            let operation = self.check_schema(index, operation, &mut issues);
            if issues.len() > before {
                state = TrackedAsset::default();
                continue;
            }

            if operation.kind.requires_full_frame() && state.cropped {
                let message = format!(
                    "{} runs after a crop and will only see the cropped region; \
                     consider moving it before the crop",
                    operation.kind
                );
                warn!("Operation {index}: {message}");
                warnings.push(ValidationWarning {
                    index,
                    kind: operation.kind,
                    message,
                });
            }

            check_against_asset(index, &operation, &mut state, &mut issues);
            operations.push(operation);
        }

        if issues.is_empty() {
            debug!(
                "Validated {} operations ({} warnings)",
                operations.len(),
                warnings.len()
            );
            Ok(ValidatedSequence {
                operations,
                warnings,
            })
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Per-operation schema checks: names, types, ranges, required parameters
    fn check_schema(
        &self,
        index: usize,
        operation: Operation,
        issues: &mut Vec<ValidationIssue>,
    ) -> Operation {
        let spec = self.catalog.spec(operation.kind);
        let kind = operation.kind;
        let mut params = Params::new();

        for (name, value) in operation.params {
            let Some(param) = spec.param(&name) else {
                issues.push(ValidationIssue::InvalidParameter {
                    index,
                    kind,
                    parameter: name,
                    reason: format!("not a parameter of {kind}"),
                });
                continue;
            };
            let value = match param.coerce(&value) {
                Ok(value) => value,
                Err(reason) => {
                    issues.push(ValidationIssue::InvalidParameter {
                        index,
                        kind,
                        parameter: name,
                        reason,
                    });
                    continue;
                }
            };
            if let Err(reason) = param.check_range(&value) {
                issues.push(ValidationIssue::OutOfRange {
                    index,
                    kind,
                    parameter: name,
                    reason,
                });
                continue;
            }
            params.insert(name, value);
        }

        for missing in spec.missing_required(&params) {
            issues.push(ValidationIssue::InvalidParameter {
                index,
                kind,
                parameter: missing,
                reason: "required parameter is missing".to_string(),
            });
        }

        spec.fill_defaults(&mut params);
        Operation {
            kind,
            params,
            rationale: operation.rationale,
        }
    }
}

fn out_of_range(index: usize, kind: OperationKind, parameter: &str, reason: String) -> ValidationIssue {
    ValidationIssue::OutOfRange {
        index,
        kind,
        parameter: parameter.to_string(),
        reason,
    }
}

/// Cross-parameter checks against the tracked asset, then advance the tracked shape
fn check_against_asset(
    index: usize,
    op: &Operation,
    state: &mut TrackedAsset,
    issues: &mut Vec<ValidationIssue>,
) {
    let kind = op.kind;
    match kind {
        OperationKind::Trim => {
            let start = op.float("start_time").unwrap_or(0.0);
            let end = op.float("end_time");

            if let Some(end) = end {
                if end <= start {
                    issues.push(out_of_range(
                        index,
                        kind,
                        "end_time",
                        format!("end_time {end} must be greater than start_time {start}"),
                    ));
                    return;
                }
            }
            if let Some(duration) = state.duration {
                if start >= duration {
                    issues.push(out_of_range(
                        index,
                        kind,
                        "start_time",
                        format!("start_time {start} is not before the end of the video ({duration:.3}s)"),
                    ));
                    return;
                }
                if let Some(end) = end.filter(|e| *e > duration + DURATION_TOLERANCE_SECS) {
                    issues.push(out_of_range(
                        index,
                        kind,
                        "end_time",
                        format!("end_time {end} is past the end of the video ({duration:.3}s)"),
                    ));
                    return;
                }
            }
            state.duration = match (end, state.duration) {
                (Some(end), Some(duration)) => Some(end.min(duration) - start),
                (Some(end), None) => Some(end - start),
                (None, Some(duration)) => Some(duration - start),
                (None, None) => None,
            };
        }
        OperationKind::Crop => {
            let x = op.int("x").unwrap_or(0);
            let y = op.int("y").unwrap_or(0);
            let width = op.int("width").unwrap_or(0);
            let height = op.int("height").unwrap_or(0);

            let mut fits = true;
            if let Some(frame_w) = state.width {
                match x.checked_add(width) {
                    Some(right) if right <= i64::from(frame_w) => {}
                    Some(right) => {
                        fits = false;
                        issues.push(out_of_range(
                            index,
                            kind,
                            "width",
                            format!("crop spans x {x}..{right} but the frame is {frame_w} pixels wide"),
                        ));
                    }
                    None => {
                        fits = false;
                        issues.push(out_of_range(
                            index,
                            kind,
                            "x",
                            format!("crop at x {x} with width {width} is outside any frame"),
                        ));
                    }
                }
            }
            if let Some(frame_h) = state.height {
                match y.checked_add(height) {
                    Some(bottom) if bottom <= i64::from(frame_h) => {}
                    Some(bottom) => {
                        fits = false;
                        issues.push(out_of_range(
                            index,
                            kind,
                            "height",
                            format!("crop spans y {y}..{bottom} but the frame is {frame_h} pixels high"),
                        ));
                    }
                    None => {
                        fits = false;
                        issues.push(out_of_range(
                            index,
                            kind,
                            "y",
                            format!("crop at y {y} with height {height} is outside any frame"),
                        ));
                    }
                }
            }
            if fits {
                state.width = u32::try_from(width).ok();
                state.height = u32::try_from(height).ok();
                state.cropped = true;
            }
        }
        OperationKind::Rotate => {
            if matches!(op.int("angle"), Some(90 | 270)) {
                std::mem::swap(&mut state.width, &mut state.height);
            }
        }
        OperationKind::Resize => {
            let width = op.int("width").and_then(|w| u32::try_from(w).ok());
            let height = op.int("height").and_then(|h| u32::try_from(h).ok());
            let (new_w, new_h) = match (width, height) {
                (Some(w), Some(h)) => (Some(w), Some(h)),
                (Some(w), None) => (Some(w), scale_other(state.height, state.width, w)),
                (None, Some(h)) => (scale_other(state.width, state.height, h), Some(h)),
                (None, None) => (state.width, state.height),
            };
            if let Some(h) = new_h.filter(|h| *h > MAX_OUTPUT_HEIGHT) {
                issues.push(out_of_range(
                    index,
                    kind,
                    "width",
                    format!("keeping the aspect ratio gives a height of {h}, larger than {MAX_OUTPUT_HEIGHT}"),
                ));
                return;
            }
            if let Some(w) = new_w.filter(|w| *w > MAX_OUTPUT_WIDTH) {
                issues.push(out_of_range(
                    index,
                    kind,
                    "height",
                    format!("keeping the aspect ratio gives a width of {w}, larger than {MAX_OUTPUT_WIDTH}"),
                ));
                return;
            }
            state.width = new_w;
            state.height = new_h;
        }
        OperationKind::SpeedAdjust => {
            if let (Some(duration), Some(speed)) = (state.duration, op.float("speed")) {
                state.duration = Some(duration / speed);
            }
        }
        OperationKind::Upscale | OperationKind::SuperResolution => {
            let factor = op.float("factor").unwrap_or(1.0);
            let scaled_w = state.width.map(|w| (f64::from(w) * factor).round() as u32);
            let scaled_h = state.height.map(|h| (f64::from(h) * factor).round() as u32);
            if let (Some(w), Some(h)) = (scaled_w, scaled_h) {
                if w > MAX_OUTPUT_WIDTH || h > MAX_OUTPUT_HEIGHT {
                    issues.push(out_of_range(
                        index,
                        kind,
                        "factor",
                        format!(
                            "scaling by {factor} gives {w}x{h}, larger than {MAX_OUTPUT_WIDTH}x{MAX_OUTPUT_HEIGHT}"
                        ),
                    ));
                    return;
                }
            }
            state.width = scaled_w;
            state.height = scaled_h;
        }
        OperationKind::BrightnessContrast
        | OperationKind::Denoise
        | OperationKind::ColorCorrection
        | OperationKind::Stabilization
        | OperationKind::MotionBlurRemoval => {}
    }
}

/// Aspect-preserving size of the dimension that was not given
fn scale_other(other: Option<u32>, this: Option<u32>, target: u32) -> Option<u32> {
    let (other, this) = (other?, this?);
    if this == 0 {
        return None;
    }
    Some((f64::from(other) * f64::from(target) / f64::from(this)).round() as u32)
}
