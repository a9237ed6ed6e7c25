//! Video Edit Core - instruction-to-operation pipeline
//!
//! Catalog of editing and enhancement operations, the compiler that turns
//! free-form instructions into operations, the validator that checks a
//! sequence against an asset, and the executor that runs it step by step
//! through a pluggable media engine.

pub mod catalog;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod interpret;
pub mod operation;
pub mod validator;

pub use catalog::{OperationCatalog, OperationDescriptor, OperationSpec, ParamSpec, ParamType};
pub use compiler::{CompiledInstruction, InstructionCompiler, UnrecognizedIntent};
pub use context::ExecutionContext;
pub use engine::{MediaEngine, MediaProbe};
pub use error::{
    CatalogError, CompilationError, ExecutionError, InterpretError, ValidationError,
    ValidationIssue,
};
pub use executor::{ExecutionResult, PipelineExecutor, PipelineOutcome, StepResult};
pub use interpret::{Interpreter, RawCandidate};
pub use operation::{
    Operation, OperationCategory, OperationKind, OperationRequest, ParamValue, Params,
};
pub use validator::{OperationValidator, ValidatedSequence, ValidationWarning};
