//! Chain of interpreters: use the secondary when the primary fails

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use video_edit_common::AssetMetadata;
use video_edit_core::{InterpretError, Interpreter, RawCandidate};

pub struct FallbackInterpreter {
    primary: Arc<dyn Interpreter>,
    secondary: Arc<dyn Interpreter>,
    name: String,
}

impl FallbackInterpreter {
    pub fn new(primary: Arc<dyn Interpreter>, secondary: Arc<dyn Interpreter>) -> Self {
        let name = format!("{}+{}", primary.name(), secondary.name());
        Self {
            primary,
            secondary,
            name,
        }
    }
}

#[async_trait]
impl Interpreter for FallbackInterpreter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn interpret(
        &self,
        instruction: &str,
        metadata: Option<&AssetMetadata>,
    ) -> Result<Vec<RawCandidate>, InterpretError> {
        match self.primary.interpret(instruction, metadata).await {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                warn!(
                    "{} interpreter failed ({}); falling back to {}",
                    self.primary.name(),
                    e,
                    self.secondary.name()
                );
                self.secondary.interpret(instruction, metadata).await
            }
        }
    }
}
