//! Query synthesis.
//!
//! Asks the generation service for a `{reasoning, query}` record. The record
//! is validated when it is deserialized; anything else is a contract
//! violation and fails the question. The query itself is passed on to
//! execution unchecked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::SynthesisError;
use crate::ai::{AIError, OutputSchema, TextGenerator};

/// Example question/query pairs included in every prompt.
const EXAMPLES: &[(&str, &str)] = &[
    (
        "How many leads?",
        "SELECT count(*) FROM opportunities WHERE stage IN ('Prospecting', 'Qualification');",
    ),
    ("Total revenue?", "SELECT sum(total_amount) FROM sales_orders WHERE status != 'Cancelled';"),
];

/// Structured result of query synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlDraft {
    /// Why the model chose this query
    pub reasoning: String,
    /// Query to execute
    pub query: String,
}

impl SqlDraft {
    /// JSON schema the generation service must satisfy.
    pub fn output_schema() -> OutputSchema {
        OutputSchema::new(
            "sql_output",
            json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Reasoning for the query"
                    },
                    "query": {
                        "type": "string",
                        "description": "The SQL query that answers the question"
                    }
                },
                "required": ["reasoning", "query"],
                "additionalProperties": false
            }),
        )
    }

    /// Validate a structured response.
    pub fn from_value(value: Value) -> Result<Self, SynthesisError> {
        let draft: Self = serde_json::from_value(value)
            .map_err(|e| SynthesisError::ContractViolation(e.to_string()))?;

        if draft.query.trim().is_empty() {
            return Err(SynthesisError::ContractViolation("query is empty".to_string()));
        }

        Ok(Self { reasoning: draft.reasoning, query: draft.query.trim().to_string() })
    }
}

/// Produces a query for a question from schema and policy evidence.
pub struct QuerySynthesizer {
    generator: Arc<dyn TextGenerator>,
    dialect: String,
}

impl QuerySynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, dialect: impl Into<String>) -> Self {
        Self { generator, dialect: dialect.into() }
    }

    /// Generate a query for `question`.
    pub async fn synthesize(
        &self,
        question: &str,
        schema: &str,
        evidence: &str,
    ) -> Result<SqlDraft, SynthesisError> {
        let prompt = self.build_prompt(question, schema, evidence);
        let value = self
            .generator
            .complete_structured(&prompt, &SqlDraft::output_schema())
            .await
            .map_err(|e| match e {
                AIError::MalformedResponse(msg) | AIError::Refused(msg) => {
                    SynthesisError::ContractViolation(msg)
                }
                other => SynthesisError::Generation(other),
            })?;
        SqlDraft::from_value(value)
    }

    /// Build the generation prompt.
    pub fn build_prompt(&self, question: &str, schema: &str, evidence: &str) -> String {
        let examples: String = EXAMPLES
            .iter()
            .map(|(q, sql)| format!("Q: \"{}\"\nSQL: {}\n", q, sql))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r"You are a {dialect} SQL agent. Write a query to answer the user's question.

SCHEMA:
{schema}

BUSINESS RULES:
{evidence}

--- EXAMPLES OF CORRECT SQL ---
{examples}--------------------------------

USER QUESTION: {question}",
            dialect = self.dialect,
            schema = schema.trim(),
            evidence = if evidence.trim().is_empty() { "(none)" } else { evidence.trim() },
            examples = examples,
            question = question.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedGenerator(Value);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String, AIError> {
            Ok(String::new())
        }

        async fn complete_structured(
            &self,
            _prompt: &str,
            _schema: &OutputSchema,
        ) -> Result<Value, AIError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn synthesizer(response: Value) -> QuerySynthesizer {
        QuerySynthesizer::new(Arc::new(FixedGenerator(response)), "PostgreSQL")
    }

    #[test]
    fn test_prompt_embeds_context() {
        let prompt = synthesizer(Value::Null).build_prompt(
            "How many open opportunities?",
            "TABLE: opportunities\n - stage (text)",
            "Open means not Closed.",
        );

        assert!(prompt.contains("PostgreSQL SQL agent"));
        assert!(prompt.contains(" - stage (text)"));
        assert!(prompt.contains("Open means not Closed."));
        assert!(prompt.contains("Q: \"Total revenue?\""));
        assert!(prompt.ends_with("USER QUESTION: How many open opportunities?"));
    }

    #[test]
    fn test_prompt_marks_missing_evidence() {
        let prompt = synthesizer(Value::Null).build_prompt("q", "TABLE: t", "  ");
        assert!(prompt.contains("BUSINESS RULES:\n(none)"));
    }

    #[tokio::test]
    async fn test_synthesize_valid_record() {
        let draft = synthesizer(json!({
            "reasoning": "count open deals",
            "query": "  SELECT count(*) FROM opportunities  "
        }))
        .synthesize("q", "s", "e")
        .await
        .unwrap();

        assert_eq!(draft.query, "SELECT count(*) FROM opportunities");
        assert_eq!(draft.reasoning, "count open deals");
    }

    #[tokio::test]
    async fn test_missing_field_is_contract_violation() {
        let err =
            synthesizer(json!({"sql": "SELECT 1"})).synthesize("q", "s", "e").await.unwrap_err();
        assert!(matches!(err, SynthesisError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn test_extra_field_is_contract_violation() {
        let err = synthesizer(json!({"reasoning": "r", "query": "SELECT 1", "confidence": 0.9}))
            .synthesize("q", "s", "e")
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn test_empty_query_is_contract_violation() {
        let err = synthesizer(json!({"reasoning": "r", "query": " "}))
            .synthesize("q", "s", "e")
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ContractViolation(_)));
    }

    #[test]
    fn test_output_schema_requires_both_fields() {
        let schema = SqlDraft::output_schema();
        assert_eq!(schema.schema["required"], json!(["reasoning", "query"]));
        assert_eq!(schema.schema["additionalProperties"], json!(false));
    }
}
