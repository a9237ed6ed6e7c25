//! Operations listing command

use anyhow::Result;
use video_edit_core::{OperationCatalog, OperationCategory};

pub fn list_operations() -> Result<()> {
    println!("Available operations:");

    for descriptor in OperationCatalog::standard().describe() {
        let category = match descriptor.category {
            OperationCategory::Edit => "edit",
            OperationCategory::Enhancement => "enhancement",
        };
        println!("\n{} [{}]", descriptor.kind, category);
        println!("  {}", descriptor.description);
        if !descriptor.requires_any.is_empty() {
            println!("  Requires at least one of: {}", descriptor.requires_any.join(", "));
        }
        for param in &descriptor.parameters {
            let mut line = format!("  - {}: {}", param.name, param.param_type.name());
            if param.required {
                line.push_str(", required");
            }
            match (param.min, param.max) {
                (Some(min), Some(max)) => line.push_str(&format!(", {min}..={max}")),
                (Some(min), None) => line.push_str(&format!(", >= {min}")),
                (None, Some(max)) => line.push_str(&format!(", <= {max}")),
                (None, None) => {}
            }
            if !param.allowed.is_empty() {
                let allowed: Vec<String> = param.allowed.iter().map(ToString::to_string).collect();
                line.push_str(&format!(", one of {}", allowed.join("/")));
            }
            if let Some(default) = &param.default {
                line.push_str(&format!(", default {default}"));
            }
            println!("{line}");
            println!("      {}", param.description);
        }
    }

    Ok(())
}
