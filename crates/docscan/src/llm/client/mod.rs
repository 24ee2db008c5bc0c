//! LLM client for structured document extraction.
//!
//! Supports the Ollama API for local inference and any OpenAI-compatible
//! chat completions API. The extraction schema is embedded in the system
//! prompt and the model is asked for JSON output.

mod config;
mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub use config::{LlmConfig, LlmProvider};
pub use prompts::{DEFAULT_EXTRACTION_PROMPT, DEFAULT_USER_PROMPT};

use crate::extraction::{ExtractionError, ExtractionSchema, StructuredExtractionService};

/// LLM client for document processing.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// OpenAI-compatible chat request.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the LLM service answers at all.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = match self.config.provider {
            LlmProvider::Ollama => format!("{}/api/tags", self.endpoint()),
            LlmProvider::OpenAI => format!("{}/v1/models", self.endpoint()),
        };
        let mut request = self.client.get(&url);
        if let Some(key) = self.config.resolve_api_key() {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Ask the model for a JSON object conforming to `schema`.
    ///
    /// The returned value is NOT validated; callers check it against the
    /// schema themselves.
    pub async fn extract_structured(
        &self,
        text: &str,
        schema: &ExtractionSchema,
    ) -> Result<Value, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let system = self
            .config
            .get_system_prompt()
            .replace("{schema}", &schema.to_pretty_string());
        let user = DEFAULT_USER_PROMPT.replace("{content}", self.truncate_content(text));

        debug!(
            "Requesting structured extraction from {} ({})",
            self.config.provider.as_str(),
            self.config.model
        );
        let raw = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(&system, &user).await?,
            LlmProvider::OpenAI => self.call_openai(&system, &user).await?,
        };

        let value = parse_json_response(&raw)?;
        info!("Received structured payload from {}", self.config.model);
        Ok(value)
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    /// Truncate content to configured maximum (UTF-8 safe).
    fn truncate_content<'a>(&self, text: &'a str) -> &'a str {
        truncate_utf8(text, self.config.max_content_chars)
    }

    /// Call Ollama API with a system and user prompt.
    async fn call_ollama(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            system: system.to_string(),
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint());
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotFound(self.config.model.clone()));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    /// Call an OpenAI-compatible chat completions API.
    async fn call_openai(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.config.resolve_api_key().ok_or_else(|| {
            LlmError::MissingApiKey(format!(
                "set llm.api_key or the {} environment variable",
                self.config.api_key_env
            ))
        })?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/v1/chat/completions", self.endpoint());
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::Parse("Empty completion".to_string()))
    }
}

#[async_trait]
impl StructuredExtractionService for LlmClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<Value, ExtractionError> {
        self.extract_structured(text, schema)
            .await
            .map_err(|e| ExtractionError::Service {
                service: self.config.model.clone(),
                message: e.to_string(),
            })
    }
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Parse a model reply into a JSON object.
///
/// Handles ```json fenced blocks, plain fenced blocks and prose around a
/// raw object.
pub fn parse_json_response(text: &str) -> Result<Value, LlmError> {
    let candidate = extract_json_object(text)
        .ok_or_else(|| LlmError::Parse("No JSON object in response".to_string()))?;
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| LlmError::Parse(e.to_string()))?;
    if !value.is_object() {
        return Err(LlmError::Parse("Response JSON is not an object".to_string()));
    }
    Ok(value)
}

fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let json_start = start + 7;
        if let Some(end) = text[json_start..].find("```") {
            return Some(text[json_start..json_start + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let block_start = start + 3;
        let content_start = text[block_start..]
            .find('\n')
            .map(|i| block_start + i + 1)
            .unwrap_or(block_start);
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    #[error("Missing API key: {0}")]
    MissingApiKey(String),
    #[error("LLM is disabled")]
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let value = parse_json_response(r#"{"issuer": "Stadtwerke"}"#).unwrap();
        assert_eq!(value["issuer"], "Stadtwerke");
    }

    #[test]
    fn test_parse_fenced_object() {
        let reply = "Here you go:\n```json\n{\"amount_total\": 12.5}\n```\nAnything else?";
        let value = parse_json_response(reply).unwrap();
        assert_eq!(value["amount_total"], 12.5);

        let plain = "```\n{\"currency\": \"EUR\"}\n```";
        assert_eq!(parse_json_response(plain).unwrap()["currency"], "EUR");
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(matches!(parse_json_response("no json here"), Err(LlmError::Parse(_))));
        assert!(matches!(parse_json_response("[1, 2]"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "Grüße";
        assert_eq!(truncate_utf8(text, 3), "Gr");
        assert_eq!(truncate_utf8(text, 100), text);
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert!(config.enabled);
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert!(config.get_system_prompt().contains("{schema}"));
    }

    #[test]
    fn test_provider_aliases() {
        assert_eq!(LlmProvider::from_str("Groq"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_str("ollama"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::from_str("claude"), None);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_key_env: "DOCSCAN_TEST_UNSET_KEY_VAR".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-test"));

        let no_key = LlmConfig {
            api_key_env: "DOCSCAN_TEST_UNSET_KEY_VAR".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(no_key.resolve_api_key(), None);
    }

    #[tokio::test]
    async fn test_disabled_client_refuses() {
        let client = LlmClient::new(LlmConfig {
            enabled: false,
            ..LlmConfig::default()
        })
        .unwrap();
        let schema = ExtractionSchema::bundled().unwrap();
        let err = client.extract_structured("text", &schema).await.unwrap_err();
        assert!(matches!(err, LlmError::Disabled));
    }
}
