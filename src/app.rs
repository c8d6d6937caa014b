//! Application wiring.
//!
//! Turns a [`Config`] into live clients and a [`WorkflowEngine`]. Nothing
//! here is global: every client is built explicitly and handed to the
//! engine.

use std::sync::Arc;

use anyhow::Context;

use crate::ai::{self, TextGenerator};
use crate::core::{Config, RetrievalPolicy};
use crate::index::{self, HashingEmbedder, IndexFile, LocalIndex, SimilarityIndex};
use crate::pipeline::{CompletedSession, PipelineResult, WorkflowEngine};
use crate::store::{self, SqlStore};

/// A configured Quarry instance.
pub struct App {
    /// Effective configuration
    pub config: Config,

    engine: WorkflowEngine,
}

impl App {
    /// Connect every client described by `config`.
    ///
    /// # Errors
    ///
    /// Fails when the database URL is unsupported, the text-generation
    /// provider cannot be configured, or the index cannot be opened and the
    /// retrieval policy is `propagate`.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store =
            store::connect(&config.database).await.context("Failed to set up the database")?;
        let index = open_index(&config)?;
        let generator =
            ai::create_generator(&config.llm).context("Failed to set up the text generator")?;

        Ok(Self::with_clients(config, store, index, generator))
    }

    /// Build an app from already-constructed clients.
    pub fn with_clients(
        config: Config,
        store: Arc<dyn SqlStore>,
        index: Arc<dyn SimilarityIndex>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let engine = WorkflowEngine::new(store, index, generator)
            .with_retrieval_policy(config.index.on_failure);
        Self { config, engine }
    }

    /// Answer a single question.
    pub async fn ask(&self, question: &str) -> PipelineResult<CompletedSession> {
        self.engine.run(question).await
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }
}

/// Open the configured similarity index.
///
/// Under the `empty` retrieval policy a missing or unreadable index is
/// replaced by an empty one so questions still run without policy context.
/// An empty index never embeds, so the fallback uses the offline embedder
/// and starts even when the configured one cannot be built.
fn open_index(config: &Config) -> anyhow::Result<Arc<dyn SimilarityIndex>> {
    match index::open_index(&config.index) {
        Ok(index) => Ok(Arc::new(index)),
        Err(e) if config.index.on_failure == RetrievalPolicy::Empty => {
            tracing::warn!(
                error = %e,
                "similarity index unavailable; answering without policy context"
            );
            let embedder = Arc::new(HashingEmbedder::new(config.index.dimensions));
            let empty = IndexFile { embedding_model: None, dimensions: 0, entries: Vec::new() };
            Ok(Arc::new(LocalIndex::from_file(empty, embedder)?))
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Failed to open the similarity index at {}",
                config.index.resolved_path().display()
            )
        }),
    }
}
