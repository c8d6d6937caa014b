//! Answer synthesis.

use std::sync::Arc;

use crate::ai::{AIError, TextGenerator};

/// Turns a result summary into a natural-language answer.
pub struct AnswerSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Answer `question` from `summary`.
    ///
    /// Error summaries are passed through as data; the model is expected to
    /// explain the failure rather than invent results.
    pub async fn synthesize(&self, question: &str, summary: &str) -> Result<String, AIError> {
        let prompt = build_prompt(question, summary);
        let answer = self.generator.complete(&prompt).await?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AIError::NoResponse);
        }
        Ok(answer.to_string())
    }
}

fn build_prompt(question: &str, summary: &str) -> String {
    format!(
        "User Question: {}\nSQL Data: {}\n\nAnswer the question simply based on the data. \
         If the data reports an SQL error, say the question could not be answered and why.",
        question.trim(),
        summary
    )
}
