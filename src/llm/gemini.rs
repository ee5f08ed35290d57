//! Google Gemini `generateContent` client

use super::{GenError, TextGenerator};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Persona used when no system instruction is configured
const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant. Answer clearly and concisely.";

/// Gemini service implementation
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    system_instruction: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        // `models/` prefix is optional in configuration
        let model_path = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };
        let base_url = format!(
            "{}/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            model_path
        );

        // No timeout is hardwired upstream; keep this conservative so a
        // stalled generation call cannot hold a turn open forever.
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
            system_instruction: config
                .system_instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenError> {
        let Some(api_key) = &self.api_key else {
            return Err(GenError::NotConfigured);
        };
        if prompt.is_empty() {
            return Err(GenError::EmptyPrompt);
        }

        let full_prompt = format!("{}\n\n{}", self.system_instruction, prompt);
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.2,
                max_output_tokens: 512,
            },
        };

        let url = format!("{}?key={}", self.base_url, api_key);
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenError::Upstream(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    GenError::Upstream(format!("Connection failed: {e}"))
                } else {
                    GenError::Upstream(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenError::Upstream(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            // Surface the upstream's own message when the error envelope parses
            if let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(&body) {
                return Err(GenError::Upstream(error_resp.error.message));
            }
            return Err(GenError::Upstream(format!("HTTP {status} error: {body}")));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| GenError::Upstream(format!("Failed to parse response: {e}")))?;

        // Last resort: hand back the raw body as display text instead of failing
        Ok(extract_text(&parsed).unwrap_or(body))
    }
}

// ============================================================
// Response normalization
// ============================================================

/// Extraction strategies in priority order; first non-empty match wins
const EXTRACTORS: &[fn(&Value) -> Option<String>] =
    &[from_candidates, from_root_content, from_flat_text];

/// Pull display text out of a heterogeneous response shape
pub fn extract_text(response: &Value) -> Option<String> {
    EXTRACTORS.iter().find_map(|extract| extract(response))
}

/// `candidates[*].content.parts[*].text`, joined with newlines
fn from_candidates(response: &Value) -> Option<String> {
    let candidates = response.get("candidates")?.as_array()?;
    let joined = candidates
        .iter()
        .filter_map(|c| c.get("content"))
        .filter_map(join_parts)
        .collect::<Vec<_>>()
        .join("\n");
    non_empty(joined)
}

/// `content.parts[*].text` at the root
fn from_root_content(response: &Value) -> Option<String> {
    response.get("content").and_then(join_parts)
}

/// Flat `text` or `output.text` fields
fn from_flat_text(response: &Value) -> Option<String> {
    let text = response
        .get("text")
        .or_else(|| response.get("output").and_then(|o| o.get("text")))?
        .as_str()?;
    non_empty(text.to_string())
}

fn join_parts(content: &Value) -> Option<String> {
    let parts = content.get("parts")?.as_array()?;
    let joined = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");
    non_empty(joined)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_candidates() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello!"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(extract_text(&response), Some("Hello!".to_string()));
    }

    #[test]
    fn test_extract_joins_multiple_parts() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "line one"}, {"text": "line two"}]}
            }]
        });
        assert_eq!(
            extract_text(&response),
            Some("line one\nline two".to_string())
        );
    }

    #[test]
    fn test_extract_trims_whitespace() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "  padded  "}]}}]
        });
        assert_eq!(extract_text(&response), Some("padded".to_string()));
    }

    #[test]
    fn test_extract_from_root_content() {
        let response = json!({
            "content": {"parts": [{"text": "root shape"}]}
        });
        assert_eq!(extract_text(&response), Some("root shape".to_string()));
    }

    #[test]
    fn test_extract_from_flat_fields() {
        assert_eq!(
            extract_text(&json!({"text": "flat"})),
            Some("flat".to_string())
        );
        assert_eq!(
            extract_text(&json!({"output": {"text": "nested flat"}})),
            Some("nested flat".to_string())
        );
    }

    #[test]
    fn test_extract_priority_order() {
        // Candidates win over flat text when both are present
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "from candidates"}]}}],
            "text": "from flat"
        });
        assert_eq!(extract_text(&response), Some("from candidates".to_string()));
    }

    #[test]
    fn test_empty_candidates_fall_through() {
        // A candidates list with no usable text must not mask later strategies
        let response = json!({
            "candidates": [{"content": {"parts": []}}],
            "text": "fallback"
        });
        assert_eq!(extract_text(&response), Some("fallback".to_string()));
    }

    #[test]
    fn test_unrecognized_shape_yields_none() {
        let response = json!({"usageMetadata": {"totalTokenCount": 7}});
        assert_eq!(extract_text(&response), None);
    }

    #[tokio::test]
    async fn test_generate_without_key_is_configuration_error() {
        let client = GeminiClient::new(&GeminiConfig {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            api_base: "http://localhost:1".to_string(),
            system_instruction: None,
        });
        assert!(matches!(
            client.generate("Hi").await,
            Err(GenError::NotConfigured)
        ));
    }
}
