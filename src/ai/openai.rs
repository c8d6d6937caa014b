//! OpenAI API integration.
//!
//! Implements the TextGenerator trait for OpenAI chat models. Structured
//! completions use `response_format` with a strict JSON schema.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{parse_json_payload, AIError, OutputSchema, TextGenerator};
use crate::core::LlmConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    ///
    /// Reads API key from OPENAI_API_KEY environment variable.
    pub fn new() -> Result<Self, AIError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AIError::ProviderNotAvailable("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: "gpt-4o".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        })
    }

    /// Create a provider from the `[llm]` config section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AIError> {
        let mut provider = Self::new()?.with_model(&config.model);
        provider.temperature = config.temperature;
        provider.max_tokens = config.max_tokens;
        if let Some(url) = &config.base_url {
            provider = provider.with_base_url(url);
        }
        Ok(provider)
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a custom base URL (for Azure OpenAI or compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, prompt: &str, schema: Option<&OutputSchema>) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            response_format: schema.map(|s| ResponseFormat::JsonSchema {
                json_schema: JsonSchemaSpec {
                    name: s.name.clone(),
                    strict: true,
                    schema: s.schema.clone(),
                },
            }),
        }
    }

    /// Make a request to the OpenAI API and return the message text.
    async fn request(&self, request: &OpenAIRequest) -> Result<String, AIError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::ApiError(format!("OpenAI ({}): {}", status, body)));
        }

        let response: OpenAIResponse = response.json().await?;
        extract_content(response)
    }
}

/// Pull the message text out of a chat completion.
fn extract_content(response: OpenAIResponse) -> Result<String, AIError> {
    let message = response.choices.into_iter().next().ok_or(AIError::NoResponse)?.message;

    if let Some(refusal) = message.refusal {
        return Err(AIError::Refused(refusal));
    }

    message.content.filter(|c| !c.trim().is_empty()).ok_or(AIError::NoResponse)
}

#[async_trait]
impl TextGenerator for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = self.build_request(prompt, None);
        self.request(&request).await
    }

    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &OutputSchema,
    ) -> Result<Value, AIError> {
        let request = self.build_request(prompt, Some(schema));
        let content = self.request(&request).await?;
        parse_json_payload(&content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaSpec },
}

#[derive(Debug, Serialize)]
struct JsonSchemaSpec {
    name: String,
    strict: bool,
    schema: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}
