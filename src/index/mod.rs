//! Policy similarity index.
//!
//! The index is built once, outside Quarry, from the business-policy corpus.
//! At question time it embeds the question and returns the nearest passages.

mod embedding;
mod local;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use embedding::{Embedder, HashingEmbedder, OpenAIEmbedder};
pub use local::{IndexEntry, IndexFile, LocalIndex, INDEX_FILE_NAME};

use crate::core::{EmbedderKind, IndexConfig};

/// A passage matched by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Passage identifier
    pub id: String,
    /// Passage text
    pub text: String,
    /// Cosine similarity to the query
    pub score: f64,
}

/// Index errors.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read index: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed index: {0}")]
    Malformed(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for similarity indices.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Return up to `k` passages ordered by similarity, most similar first.
    async fn search(&self, text: &str, k: usize) -> Result<Vec<SearchHit>, IndexError>;
}

/// Create the configured embedder.
pub fn create_embedder(config: &IndexConfig) -> Result<Arc<dyn Embedder>, IndexError> {
    let embedder: Arc<dyn Embedder> = match config.embedder {
        EmbedderKind::OpenAi => Arc::new(OpenAIEmbedder::new(&config.embedding_model)?),
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(config.dimensions)),
    };
    Ok(embedder)
}

/// Open the persisted index described by the `[index]` config section.
pub fn open_index(config: &IndexConfig) -> Result<LocalIndex, IndexError> {
    let embedder = create_embedder(config)?;
    LocalIndex::open(&config.resolved_path(), embedder)
}
