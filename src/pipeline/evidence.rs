//! Policy evidence retrieval.

use std::sync::Arc;

use crate::index::{IndexError, SimilarityIndex};

/// Number of passages included in each prompt.
pub const EVIDENCE_TOP_K: usize = 2;

/// Pulls the business rules most relevant to a question.
pub struct EvidenceRetriever {
    index: Arc<dyn SimilarityIndex>,
}

impl EvidenceRetriever {
    pub fn new(index: Arc<dyn SimilarityIndex>) -> Self {
        Self { index }
    }

    /// Passage texts of the top matches, most similar first, newline-joined.
    ///
    /// Returns an empty string when the index has nothing to offer.
    pub async fn retrieve(&self, question: &str) -> Result<String, IndexError> {
        let hits = self.index.search(question, EVIDENCE_TOP_K).await?;
        tracing::debug!(hits = hits.len(), "retrieved policy evidence");

        Ok(hits
            .into_iter()
            .take(EVIDENCE_TOP_K)
            .map(|hit| hit.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::index::SearchHit;

    /// Ignores `k` to prove the retriever enforces it.
    struct GreedyIndex(Vec<&'static str>);

    #[async_trait]
    impl SimilarityIndex for GreedyIndex {
        async fn search(&self, _text: &str, _k: usize) -> Result<Vec<SearchHit>, IndexError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, text)| SearchHit {
                    id: format!("p{}", i),
                    text: text.to_string(),
                    score: 1.0 - i as f64 * 0.1,
                })
                .collect())
        }
    }

    struct FailingIndex;

    #[async_trait]
    impl SimilarityIndex for FailingIndex {
        async fn search(&self, _text: &str, _k: usize) -> Result<Vec<SearchHit>, IndexError> {
            Err(IndexError::Embedding("service down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_retrieve_joins_top_two() {
        let retriever = EvidenceRetriever::new(Arc::new(GreedyIndex(vec![
            "Open means not Closed.",
            "Revenue excludes Cancelled orders.",
            "Quotes expire after 30 days.",
        ])));

        let evidence = retriever.retrieve("How many open deals?").await.unwrap();
        assert_eq!(evidence, "Open means not Closed.\nRevenue excludes Cancelled orders.");
    }

    #[tokio::test]
    async fn test_retrieve_empty_index() {
        let retriever = EvidenceRetriever::new(Arc::new(GreedyIndex(vec![])));
        assert_eq!(retriever.retrieve("anything").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_retrieve_propagates_index_errors() {
        let retriever = EvidenceRetriever::new(Arc::new(FailingIndex));
        assert!(matches!(retriever.retrieve("q").await, Err(IndexError::Embedding(_))));
    }
}
