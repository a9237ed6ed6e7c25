//! Hosted-model interpreter backed by the Generative Language API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info};
use video_edit_common::AssetMetadata;
use video_edit_core::{InterpretError, Interpreter, OperationCatalog, RawCandidate};

const MAX_RESPONSE_LOG_CHARS: usize = 2_000;

/// Connection settings for [`GeminiInterpreter`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL, without the `/models/...` suffix
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct GeminiInterpreter {
    client: reqwest::Client,
    config: GeminiConfig,
    system_prompt: String,
}

impl GeminiInterpreter {
    pub fn new(config: GeminiConfig, catalog: &OperationCatalog) -> Result<Self, InterpretError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InterpretError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            config,
            system_prompt: build_system_prompt(catalog),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

fn build_system_prompt(catalog: &OperationCatalog) -> String {
    let mut prompt = String::from(
        "You convert a user's natural-language video editing instruction into a JSON array \
         of operations. Each element is an object with keys \"type\" (one of the operation \
         names below), \"params\" (object) and \"rationale\" (short string). Keep the order in \
         which the user asked for the edits. If part of the instruction matches no operation, \
         emit {\"unrecognized\": \"<that part>\"} for it instead of guessing. Output only the JSON array.\n\n\
         Operations:\n",
    );
    for spec in catalog.specs() {
        let _ = write!(prompt, "- {}: {}", spec.kind, spec.description);
        let params: Vec<String> = spec
            .params
            .iter()
            .map(|p| {
                let mut s = format!("{} ({}", p.name, p.param_type.name());
                if let (Some(min), Some(max)) = (p.min, p.max) {
                    let _ = write!(s, ", {min}..{max}");
                }
                if !p.allowed.is_empty() {
                    let _ = write!(s, ", one of {:?}", p.allowed);
                }
                if p.required {
                    s.push_str(", required");
                }
                s.push(')');
                s
            })
            .collect();
        if !params.is_empty() {
            let _ = write!(prompt, "; params: {}", params.join(", "));
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "\nExample: [{\"type\":\"trim\",\"params\":{\"start_time\":0,\"end_time\":10},\"rationale\":\"keep the first ten seconds\"},\
         {\"type\":\"denoise\",\"params\":{},\"rationale\":\"footage is grainy\"}]\n",
    );
    prompt
}

fn build_user_prompt(instruction: &str, metadata: Option<&AssetMetadata>) -> String {
    let mut user = String::new();
    if let Some(meta) = metadata {
        user.push_str("Video:\n");
        if let Some(duration) = meta.duration_secs {
            let _ = writeln!(user, "- duration: {duration:.2}s");
        }
        if let Some((w, h)) = meta.resolution() {
            let _ = writeln!(user, "- resolution: {w}x{h}");
        }
        user.push('\n');
    }
    let _ = write!(user, "Instruction:\n{instruction}\n");
    user
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Shape the model is asked to produce
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelItem {
    Operation {
        #[serde(alias = "kind", alias = "operation")]
        r#type: String,
        #[serde(default, alias = "parameters")]
        params: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        rationale: Option<String>,
    },
    Unrecognized {
        unrecognized: String,
    },
}

impl From<ModelItem> for RawCandidate {
    fn from(item: ModelItem) -> Self {
        match item {
            ModelItem::Operation {
                r#type,
                params,
                rationale,
            } => RawCandidate::Operation {
                kind: r#type,
                params,
                rationale,
            },
            ModelItem::Unrecognized { unrecognized } => RawCandidate::Unrecognized {
                text: unrecognized,
            },
        }
    }
}

/// Pull the JSON array out of model text that may be wrapped in prose or code fences
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_model_text(text: &str) -> Result<Vec<RawCandidate>, InterpretError> {
    let json = extract_json_array(text).ok_or_else(|| {
        InterpretError::InvalidResponse(format!(
            "no JSON array in model output: {}",
            truncate(text, 200)
        ))
    })?;
    let items: Vec<ModelItem> = serde_json::from_str(json)?;
    Ok(items.into_iter().map(RawCandidate::from).collect())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl Interpreter for GeminiInterpreter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn interpret(
        &self,
        instruction: &str,
        metadata: Option<&AssetMetadata>,
    ) -> Result<Vec<RawCandidate>, InterpretError> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: self.system_prompt.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: build_user_prompt(instruction, metadata),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
            },
        };

        info!("Requesting interpretation from {}", self.config.model);
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| InterpretError::Request(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(InterpretError::Request(format!(
                "HTTP {}: {}",
                status,
                truncate(&text, 500)
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InterpretError::InvalidResponse(e.without_url().to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .ok_or_else(|| InterpretError::InvalidResponse("response has no candidates".to_string()))?;
        debug!("Model output: {}", truncate(&text, MAX_RESPONSE_LOG_CHARS));

        parse_model_text(&text)
    }
}
