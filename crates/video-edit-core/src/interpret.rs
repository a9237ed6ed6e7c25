//! Seam to the natural-language interpretation backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use video_edit_common::AssetMetadata;

use crate::error::InterpretError;

/// One piece of an interpreted instruction, in reading order
///
/// Candidates are untrusted: kinds and parameters are checked by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "candidate", rename_all = "snake_case")]
pub enum RawCandidate {
    Operation {
        #[serde(alias = "type", alias = "operation_type")]
        kind: String,
        #[serde(default, alias = "parameters")]
        params: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        rationale: Option<String>,
    },
    Unrecognized {
        text: String,
    },
}

impl RawCandidate {
    pub fn operation(kind: impl Into<String>) -> Self {
        Self::Operation {
            kind: kind.into(),
            params: serde_json::Map::new(),
            rationale: None,
        }
    }

    /// Add a parameter; no-op on `Unrecognized`
    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        if let Self::Operation { params, .. } = &mut self {
            params.insert(name.to_string(), value.into());
        }
        self
    }

    #[must_use]
    pub fn with_rationale(mut self, text: impl Into<String>) -> Self {
        if let Self::Operation { rationale, .. } = &mut self {
            *rationale = Some(text.into());
        }
        self
    }

    pub fn unrecognized(text: impl Into<String>) -> Self {
        Self::Unrecognized { text: text.into() }
    }
}

/// Turns free-form text into raw operation candidates
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Backend identifier, used in logs
    fn name(&self) -> &str;

    async fn interpret(
        &self,
        instruction: &str,
        metadata: Option<&AssetMetadata>,
    ) -> Result<Vec<RawCandidate>, InterpretError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_json_shape() {
        let parsed: Vec<RawCandidate> = serde_json::from_str(
            r#"[
                {"candidate": "operation", "type": "trim", "parameters": {"start_time": 0, "end_time": 10}},
                {"candidate": "operation", "kind": "denoise", "rationale": "grainy footage"},
                {"candidate": "unrecognized", "text": "make it louder"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            parsed[0],
            RawCandidate::operation("trim")
                .with_param("start_time", 0)
                .with_param("end_time", 10)
        );
        assert_eq!(
            parsed[1],
            RawCandidate::operation("denoise").with_rationale("grainy footage")
        );
        assert_eq!(parsed[2], RawCandidate::unrecognized("make it louder"));
    }
}
