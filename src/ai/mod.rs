//! Text-generation service integration.
//!
//! Provides the two call shapes the pipeline needs:
//!
//! - Free-text completion (answer synthesis)
//! - Structured output constrained by a JSON schema (query synthesis)

mod ollama;
mod openai;

use std::sync::Arc;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{LlmConfig, ProviderKind};

/// JSON schema a structured completion must satisfy.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name reported to the provider
    pub name: String,
    /// JSON Schema document
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self { name: name.into(), schema }
    }
}

/// Trait for text-generation providers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate free text for a prompt.
    async fn complete(&self, prompt: &str) -> Result<String, AIError>;

    /// Generate a JSON value constrained by `schema`.
    ///
    /// Providers only guarantee the payload is JSON; callers validate the shape.
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &OutputSchema,
    ) -> Result<Value, AIError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Model refused the request: {0}")]
    Refused(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No response from AI")]
    NoResponse,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Create the configured text-generation provider.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, AIError> {
    let generator: Arc<dyn TextGenerator> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAIProvider::from_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)),
    };
    tracing::debug!(provider = generator.name(), model = %config.model, "text generator ready");
    Ok(generator)
}

/// Parse a JSON payload out of model text.
///
/// Tolerates surrounding whitespace and a single markdown code fence.
pub(crate) fn parse_json_payload(text: &str) -> Result<Value, AIError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| AIError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_json_payload(r#" {"reasoning": "r", "query": "SELECT 1"} "#).unwrap();
        assert_eq!(value["query"], "SELECT 1");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"reasoning\": \"r\", \"query\": \"SELECT 1\"}\n```";
        let value = parse_json_payload(text).unwrap();
        assert_eq!(value["reasoning"], "r");
    }

    #[test]
    fn test_parse_non_json_is_malformed() {
        let err = parse_json_payload("SELECT count(*) FROM opportunities").unwrap_err();
        assert!(matches!(err, AIError::MalformedResponse(_)));
    }

    #[test]
    fn test_create_ollama_generator() {
        let config = LlmConfig {
            provider: ProviderKind::Ollama,
            model: "llama3.2".to_string(),
            ..Default::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "ollama");
    }
}
