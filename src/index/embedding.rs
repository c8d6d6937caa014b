//! Embedding functions.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::IndexError;

/// Trait for text embedding functions.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    /// Get the embedder name.
    fn name(&self) -> &str;
}

/// OpenAI embeddings API.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIEmbedder {
    /// Create a new embedder.
    ///
    /// Reads API key from OPENAI_API_KEY environment variable.
    pub fn new(model: impl Into<String>) -> Result<Self, IndexError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| IndexError::Embedding("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let request = EmbeddingRequest { model: self.model.clone(), input: text.to_string() };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Embedding(format!("OpenAI ({}): {}", status, body)));
        }

        let response: EmbeddingResponse =
            response.json().await.map_err(|e| IndexError::Embedding(e.to_string()))?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| IndexError::Embedding("empty embedding response".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Offline feature-hashing embedder.
///
/// Hashes lowercase terms into fixed-dimension buckets weighted by term
/// frequency, then L2-normalizes. Deterministic and always available, at the
/// cost of semantic quality.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    /// Hash a term into a bucket index using FNV-1a.
    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        (h % dims as u64) as usize
    }

    /// Tokenize text into lowercase alphanumeric terms.
    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// Compute the vector synchronously.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        let mut vec = vec![0.0f32; self.dimensions];
        if tokens.is_empty() {
            return vec;
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for tok in &tokens {
            *tf.entry(tok.as_str()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        for (term, count) in tf {
            vec[Self::bucket(term, self.dimensions)] += count / total;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }

        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        Ok(self.vector(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
