//! Ollama local LLM integration.
//!
//! Implements the TextGenerator trait for Ollama (local LLM). Structured
//! completions pass the JSON schema through the `format` field.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_json_payload, AIError, OutputSchema, TextGenerator};
use crate::core::LlmConfig;

/// Ollama API provider for local LLM.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default settings.
    ///
    /// Uses localhost:11434 by default.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: "llama3.2".to_string(),
            temperature: 0.0,
        }
    }

    /// Create a provider from the `[llm]` config section.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut provider = Self::new().with_model(&config.model);
        provider.temperature = config.temperature;
        if let Some(url) = &config.base_url {
            provider = provider.with_base_url(url);
        }
        provider
    }

    /// Create with a specific base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(&self, prompt: &str, format: Option<Value>) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format,
            options: OllamaOptions { temperature: self.temperature },
        }
    }

    /// Make a request to the Ollama API.
    async fn request(&self, request: &OllamaRequest) -> Result<String, AIError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::ApiError(format!("Ollama ({}): {}", status, body)));
        }

        let response: OllamaResponse = response.json().await?;
        if response.response.trim().is_empty() {
            return Err(AIError::NoResponse);
        }
        Ok(response.response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = self.build_request(prompt, None);
        self.request(&request).await
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &OutputSchema,
    ) -> Result<Value, AIError> {
        let request = self.build_request(prompt, Some(schema.schema.clone()));
        let text = self.request(&request).await?;
        parse_json_payload(&text)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}
