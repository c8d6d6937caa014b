//! Question-to-answer pipeline.
//!
//! A question moves through a fixed sequence of phases:
//!
//! - **Retrieve**: schema introspection and policy evidence
//! - **SynthesizeQuery**: structured `{reasoning, query}` generation
//! - **ExecuteQuery**: run the query, containing any fault
//! - **SynthesizeAnswer**: natural-language answer from the result
//!
//! [`WorkflowEngine`] drives the phases and threads a [`SessionState`]
//! between them.

mod answer;
mod engine;
mod error;
mod evidence;
mod executor;
mod query;
mod schema;
mod state;

pub use answer::AnswerSynthesizer;
pub use engine::WorkflowEngine;
pub use error::{PipelineError, PipelineResult, SynthesisError};
pub use evidence::{EvidenceRetriever, EVIDENCE_TOP_K};
pub use executor::{ExecutionOutcome, QueryExecutor, ERROR_MARKER, NO_ROWS_SUMMARY};
pub use query::{QuerySynthesizer, SqlDraft};
pub use schema::{render_schema, SchemaIntrospector, SCHEMA_EMPTY, SCHEMA_UNAVAILABLE};
pub use state::{CompletedSession, Phase, PhaseOutput, SessionState};
