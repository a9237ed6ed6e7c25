//! Instruction compiler: free-form text to a catalog-conformant operation list

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use video_edit_common::AssetMetadata;

use crate::catalog::OperationCatalog;
use crate::error::CompilationError;
use crate::interpret::{Interpreter, RawCandidate};
use crate::operation::{Operation, ParamValue};

/// A part of the instruction that produced no operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnrecognizedIntent {
    pub text: String,
    pub reason: String,
}

/// Output of a successful compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledInstruction {
    /// Operations in the order the instruction gave them, defaults filled
    pub operations: Vec<Operation>,
    pub unrecognized: Vec<UnrecognizedIntent>,
}

pub struct InstructionCompiler {
    interpreter: Arc<dyn Interpreter>,
    catalog: OperationCatalog,
}

impl InstructionCompiler {
    pub fn new(interpreter: Arc<dyn Interpreter>) -> Self {
        Self::with_catalog(interpreter, OperationCatalog::standard())
    }

    pub fn with_catalog(interpreter: Arc<dyn Interpreter>, catalog: OperationCatalog) -> Self {
        Self {
            interpreter,
            catalog,
        }
    }

    /// Name of the interpretation backend in use
    #[must_use]
    pub fn interpreter_name(&self) -> &str {
        self.interpreter.name()
    }

    pub async fn compile(
        &self,
        instruction: &str,
        metadata: Option<&AssetMetadata>,
    ) -> Result<CompiledInstruction, CompilationError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(CompilationError::EmptyInstruction);
        }

        info!(
            "Compiling instruction with {}: {:?}",
            self.interpreter.name(),
            instruction
        );
        let candidates = self.interpreter.interpret(instruction, metadata).await?;
        debug!("Interpreter returned {} candidates", candidates.len());

        let mut operations = Vec::with_capacity(candidates.len());
        let mut unrecognized = Vec::new();

        for candidate in candidates {
            let (kind_name, raw_params, rationale) = match candidate {
                RawCandidate::Operation {
                    kind,
                    params,
                    rationale,
                } => (kind, params, rationale),
                RawCandidate::Unrecognized { text } => {
                    warn!("Unrecognized intent: {:?}", text);
                    unrecognized.push(UnrecognizedIntent {
                        text,
                        reason: "no matching operation".to_string(),
                    });
                    continue;
                }
            };

            let spec = match self.catalog.lookup(&kind_name) {
                Ok(spec) => spec,
                Err(err) => {
                    warn!("Discarding candidate: {}", err);
                    unrecognized.push(UnrecognizedIntent {
                        reason: err.to_string(),
                        text: kind_name,
                    });
                    continue;
                }
            };

            let mut operation = Operation::new(spec.kind);
            operation.rationale = rationale;
            for (name, value) in raw_params {
                let Some(param) = spec.param(&name) else {
                    debug!("Dropping undeclared parameter {}.{}", spec.kind, name);
                    continue;
                };
                let coerced = ParamValue::from_json(&value)
                    .ok_or_else(|| format!("expected a number, got {value}"))
                    .and_then(|v| param.coerce_lenient(&v));
                match coerced {
                    Ok(v) => {
                        operation.params.insert(name, v);
                    }
                    Err(reason) => {
                        warn!("Dropping parameter {}.{}: {}", spec.kind, name, reason);
                    }
                }
            }

            let index = operations.len();
            let missing = spec.missing_required(&operation.params);
            if !missing.is_empty() {
                return Err(CompilationError::MissingRequiredParameters {
                    index,
                    kind: spec.kind,
                    missing,
                });
            }

            spec.fill_defaults(&mut operation.params);
            debug!("Compiled operation {}: {}", index, operation);
            operations.push(operation);
        }

        if operations.is_empty() {
            return Err(CompilationError::NoRecognizedOperations {
                unrecognized: unrecognized.into_iter().map(|u| u.text).collect(),
                supported: self.catalog.kind_names(),
            });
        }

        info!(
            "Compiled {} operations ({} unrecognized intents)",
            operations.len(),
            unrecognized.len()
        );
        Ok(CompiledInstruction {
            operations,
            unrecognized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterpretError;
    use crate::operation::OperationKind;
    use async_trait::async_trait;

    /// Returns a fixed candidate list
    struct Scripted(Vec<RawCandidate>);

    #[async_trait]
    impl Interpreter for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn interpret(
            &self,
            _instruction: &str,
            _metadata: Option<&AssetMetadata>,
        ) -> Result<Vec<RawCandidate>, InterpretError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Interpreter for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn interpret(
            &self,
            _instruction: &str,
            _metadata: Option<&AssetMetadata>,
        ) -> Result<Vec<RawCandidate>, InterpretError> {
            Err(InterpretError::Unavailable("connection refused".to_string()))
        }
    }

    fn compiler(candidates: Vec<RawCandidate>) -> InstructionCompiler {
        InstructionCompiler::new(Arc::new(Scripted(candidates)))
    }

    #[tokio::test]
    async fn test_order_and_defaults_preserved() {
        let compiled = compiler(vec![
            RawCandidate::operation("denoise"),
            RawCandidate::operation("trim").with_param("end_time", 10),
            RawCandidate::operation("denoise").with_param("intensity", 0.3),
        ])
        .compile("denoise, cut to 10s, denoise lightly", None)
        .await
        .unwrap();

        let kinds: Vec<OperationKind> = compiled.operations.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::Denoise, OperationKind::Trim, OperationKind::Denoise]
        );
        assert_eq!(compiled.operations[0].float("intensity"), Some(0.7));
        assert_eq!(compiled.operations[1].float("end_time"), Some(10.0));
        assert_eq!(compiled.operations[2].float("intensity"), Some(0.3));
    }

    #[tokio::test]
    async fn test_unknown_kinds_are_discarded_not_fatal() {
        let compiled = compiler(vec![
            RawCandidate::operation("volume_boost").with_param("gain", 3),
            RawCandidate::operation("rotate").with_param("angle", 90),
        ])
        .compile("louder and rotate", None)
        .await
        .unwrap();

        assert_eq!(compiled.operations.len(), 1);
        assert_eq!(compiled.unrecognized.len(), 1);
        assert_eq!(compiled.unrecognized[0].text, "volume_boost");
    }

    #[tokio::test]
    async fn test_nothing_recognized_is_an_error() {
        let err = compiler(vec![RawCandidate::unrecognized("make it louder")])
            .compile("make it louder", None)
            .await
            .unwrap_err();
        match err {
            CompilationError::NoRecognizedOperations {
                unrecognized,
                supported,
            } => {
                assert_eq!(unrecognized, vec!["make it louder".to_string()]);
                assert!(supported.contains(&"trim"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_text_numbers_coerced_and_bad_params_dropped() {
        let compiled = compiler(vec![RawCandidate::operation("rotate")
            .with_param("angle", "90")
            .with_param("direction", "clockwise")])
        .compile("rotate 90", None)
        .await
        .unwrap();
        let rotate = &compiled.operations[0];
        assert_eq!(rotate.params.get("angle"), Some(&ParamValue::Int(90)));
        assert!(!rotate.params.contains_key("direction"));
    }

    #[tokio::test]
    async fn test_missing_required_rejects_whole_instruction() {
        let err = compiler(vec![
            RawCandidate::operation("denoise"),
            RawCandidate::operation("trim").with_param("start_time", "soon"),
        ])
        .compile("denoise and trim", None)
        .await
        .unwrap_err();
        match err {
            CompilationError::MissingRequiredParameters {
                index,
                kind,
                missing,
            } => {
                assert_eq!(index, 1);
                assert_eq!(kind, OperationKind::Trim);
                assert_eq!(missing, vec!["start_time or end_time".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_interpreter_failure_and_empty_input() {
        let broken = InstructionCompiler::new(Arc::new(Broken));
        let err = broken.compile("rotate", None).await.unwrap_err();
        assert!(matches!(err, CompilationError::InterpretationFailed(_)));
        assert!(err.to_string().contains("rephras"));

        let err = compiler(vec![]).compile("   ", None).await.unwrap_err();
        assert!(matches!(err, CompilationError::EmptyInstruction));
    }
}
