//! File-backed similarity index.
//!
//! The index directory holds a single `index.json` with every passage and its
//! embedding. Search is a brute-force cosine scan, which is fine for a policy
//! corpus of a few thousand passages.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Embedder, IndexError, SearchHit, SimilarityIndex};

/// Name of the index file inside the index directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// On-disk index layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    /// Embedding model the entries were built with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Vector dimensions shared by all entries
    pub dimensions: usize,
    /// Indexed passages
    pub entries: Vec<IndexEntry>,
}

/// One indexed passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Similarity index loaded into memory.
pub struct LocalIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    embedder: Arc<dyn Embedder>,
}

impl LocalIndex {
    /// Load the index from a directory.
    pub fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        let path = dir.join(INDEX_FILE_NAME);
        if !path.exists() {
            return Err(IndexError::NotFound(dir.to_path_buf()));
        }

        let content = std::fs::read_to_string(&path)?;
        let file: IndexFile =
            serde_json::from_str(&content).map_err(|e| IndexError::Malformed(e.to_string()))?;

        tracing::debug!(
            path = %path.display(),
            entries = file.entries.len(),
            embedder = embedder.name(),
            "loaded similarity index"
        );

        Self::from_file(file, embedder)
    }

    /// Build an index from an already-parsed file.
    pub fn from_file(file: IndexFile, embedder: Arc<dyn Embedder>) -> Result<Self, IndexError> {
        if let Some(entry) = file.entries.iter().find(|e| e.embedding.len() != file.dimensions) {
            return Err(IndexError::Malformed(format!(
                "entry '{}' has {} dimensions, expected {}",
                entry.id,
                entry.embedding.len(),
                file.dimensions
            )));
        }

        Ok(Self { entries: file.entries, dimensions: file.dimensions, embedder })
    }

    /// Number of indexed passages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SimilarityIndex for LocalIndex {
    async fn search(&self, text: &str, k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        // Zero-norm queries match nothing.
        let query_norm_sq: f64 = query.iter().map(|x| f64::from(*x) * f64::from(*x)).sum();
        if query_norm_sq == 0.0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&query, &entry.embedding)))
            .collect();

        // Stable sort keeps index order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                id: self.entries[i].id.clone(),
                text: self.entries[i].text.clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity between two equal-length vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
