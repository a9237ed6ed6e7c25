//! Instruction interpreters
//!
//! - [`KeywordInterpreter`]: local rule-based parser, always available
//! - [`GeminiInterpreter`]: hosted model over HTTP, needs an API key
//! - [`FallbackInterpreter`]: tries one backend, falls back to another
//!
//! [`build_interpreter`] picks a backend from [`InterpreterConfig`].

mod fallback;
mod gemini;
mod keyword;

pub use fallback::FallbackInterpreter;
pub use gemini::{GeminiConfig, GeminiInterpreter};
pub use keyword::KeywordInterpreter;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use video_edit_core::{InterpretError, Interpreter, OperationCatalog};

/// Which interpretation backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpreterBackend {
    /// Hosted model when an API key is present, keyword rules otherwise
    #[default]
    Auto,
    Keyword,
    Gemini,
}

impl std::str::FromStr for InterpreterBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "keyword" | "rules" => Ok(Self::Keyword),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown interpreter backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub backend: InterpreterBackend,
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key; the key itself is never configured
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            backend: InterpreterBackend::Auto,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Build the configured interpreter
///
/// Hosted backends are always chained with the keyword interpreter so an
/// outage degrades to rule-based parsing instead of failing the request.
pub fn build_interpreter(
    config: &InterpreterConfig,
    catalog: &OperationCatalog,
) -> Result<Arc<dyn Interpreter>, InterpretError> {
    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());
    build_with_key(config, catalog, api_key)
}

fn build_with_key(
    config: &InterpreterConfig,
    catalog: &OperationCatalog,
    api_key: Option<String>,
) -> Result<Arc<dyn Interpreter>, InterpretError> {
    let keyword: Arc<dyn Interpreter> = Arc::new(KeywordInterpreter::new());

    let api_key = match (config.backend, api_key) {
        (InterpreterBackend::Keyword, _) | (InterpreterBackend::Auto, None) => {
            info!("Using keyword interpreter");
            return Ok(keyword);
        }
        (InterpreterBackend::Gemini, None) => {
            warn!(
                "Gemini interpreter requested but {} is not set; using keyword interpreter",
                config.api_key_env
            );
            return Ok(keyword);
        }
        (_, Some(key)) => key,
    };

    let gemini = GeminiInterpreter::new(
        GeminiConfig {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        },
        catalog,
    )?;
    info!("Using Gemini interpreter ({}) with keyword fallback", config.model);
    Ok(Arc::new(FallbackInterpreter::new(Arc::new(gemini), keyword)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_selection() {
        let catalog = OperationCatalog::standard();
        let auto = InterpreterConfig::default();

        let chosen = build_with_key(&auto, &catalog, None).unwrap();
        assert_eq!(chosen.name(), "keyword");

        let chosen = build_with_key(&auto, &catalog, Some("k".to_string())).unwrap();
        assert_eq!(chosen.name(), "gemini+keyword");

        let keyword_only = InterpreterConfig {
            backend: InterpreterBackend::Keyword,
            ..InterpreterConfig::default()
        };
        let chosen = build_with_key(&keyword_only, &catalog, Some("k".to_string())).unwrap();
        assert_eq!(chosen.name(), "keyword");
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Gemini".parse::<InterpreterBackend>(), Ok(InterpreterBackend::Gemini));
        assert!("openai".parse::<InterpreterBackend>().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: InterpreterConfig = serde_json::from_str(r#"{"backend": "keyword"}"#).unwrap();
        assert_eq!(config.backend, InterpreterBackend::Keyword);
        assert_eq!(config.api_key_env, "GEMINI_API_KEY");
    }
}
