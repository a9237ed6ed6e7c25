//! Error types for catalog lookup, compilation, validation and execution

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::operation::OperationKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown operation kind: {0}")]
    UnknownOperationKind(String),
}

/// Failures reported by an instruction interpreter backend
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Interpreter unavailable: {0}")]
    Unavailable(String),

    #[error("Interpreter request failed: {0}")]
    Request(String),

    #[error("Interpreter returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why an instruction could not be turned into operations
///
/// Messages are shown to end users, so each one says how to rephrase.
#[derive(Error, Debug)]
pub enum CompilationError {
    #[error("Instruction is empty; describe the edits you want, e.g. \"trim from 0 to 10 seconds\"")]
    EmptyInstruction,

    #[error("Could not interpret the instruction ({0}); try rephrasing it as explicit edits, e.g. \"rotate 90 degrees\"")]
    InterpretationFailed(#[from] InterpretError),

    #[error(
        "No supported operations found in the instruction; try rephrasing using one of: {}",
        .supported.join(", ")
    )]
    NoRecognizedOperations {
        unrecognized: Vec<String>,
        supported: Vec<&'static str>,
    },

    #[error(
        "Operation {index} ({kind}) is missing required parameters: {}; try rephrasing with explicit values",
        .missing.join(", ")
    )]
    MissingRequiredParameters {
        index: usize,
        kind: OperationKind,
        missing: Vec<String>,
    },
}

/// A single problem found while validating an operation sequence
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("operation sequence is empty")]
    EmptySequence,

    #[error("operation {index}: unknown operation kind '{kind}'")]
    UnknownOperationKind { index: usize, kind: String },

    #[error("operation {index} ({kind}): invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        index: usize,
        kind: OperationKind,
        parameter: String,
        reason: String,
    },

    #[error("operation {index} ({kind}): parameter '{parameter}' out of range: {reason}")]
    OutOfRange {
        index: usize,
        kind: OperationKind,
        parameter: String,
        reason: String,
    },
}

impl ValidationIssue {
    /// Index of the offending operation, if the issue is tied to one
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::EmptySequence => None,
            Self::UnknownOperationKind { index, .. }
            | Self::InvalidParameter { index, .. }
            | Self::OutOfRange { index, .. } => Some(*index),
        }
    }
}

/// Rejection of an operation sequence, listing every issue found
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("Invalid operation sequence: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures while running a validated sequence
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Nothing to execute: operation sequence is empty")]
    EmptySequence,

    #[error("Failed to prepare {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation {index} ({kind}) failed: {detail}")]
    OperationFailed {
        index: usize,
        kind: OperationKind,
        detail: String,
        last_intermediate: Option<PathBuf>,
    },

    #[error("Timed out after {completed_steps} of {total_steps} operations")]
    TimedOut {
        completed_steps: usize,
        total_steps: usize,
        last_intermediate: Option<PathBuf>,
    },
}

impl ExecutionError {
    /// Last successfully produced intermediate file, kept for diagnostics
    #[must_use]
    pub fn last_intermediate(&self) -> Option<&PathBuf> {
        match self {
            Self::OperationFailed {
                last_intermediate, ..
            }
            | Self::TimedOut {
                last_intermediate, ..
            } => last_intermediate.as_ref(),
            _ => None,
        }
    }
}
