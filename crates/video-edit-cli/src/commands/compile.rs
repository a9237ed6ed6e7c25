//! Compile command: show the operations an instruction turns into

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use video_edit_core::{InstructionCompiler, OperationCatalog, OperationValidator};
use video_edit_interpreter::build_interpreter;

use super::{load_config, probe_metadata};

#[derive(Args)]
pub struct CompileCommand {
    /// Editing instruction, e.g. "trim the first 5 seconds and denoise"
    #[arg(value_name = "INSTRUCTION")]
    instruction: String,

    /// Media file to compile against; enables duration and frame size checks
    #[arg(short, long)]
    input: Option<PathBuf>,
}

impl CompileCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let catalog = OperationCatalog::standard();
        let compiler =
            InstructionCompiler::with_catalog(build_interpreter(&config.interpreter, &catalog)?, catalog);
        info!("Interpreter: {}", compiler.interpreter_name());

        let metadata = match &self.input {
            Some(path) => Some(probe_metadata(&config, path).await),
            None => None,
        };

        let compiled = compiler.compile(&self.instruction, metadata.as_ref()).await?;
        println!("{}", serde_json::to_string_pretty(&compiled)?);

        if let (Some(path), Some(metadata)) = (&self.input, metadata) {
            let validated = OperationValidator::new(catalog).validate(&compiled.operations, &metadata)?;
            for warning in &validated.warnings {
                warn!("Operation {} ({}): {}", warning.index, warning.kind, warning.message);
            }
            println!(
                "✓ {} operations valid for {}",
                validated.operations.len(),
                path.display()
            );
        }

        Ok(())
    }
}
