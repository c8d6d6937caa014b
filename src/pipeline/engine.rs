//! The workflow engine.
//!
//! Runs the fixed phase sequence for one question. Each phase reads what it
//! needs from the [`SessionState`] and hands back a [`PhaseOutput`] holding
//! only the fields it owns; the engine merges it and moves on.

use std::sync::Arc;

use tracing::Instrument;

use super::answer::AnswerSynthesizer;
use super::error::{PipelineError, PipelineResult};
use super::evidence::EvidenceRetriever;
use super::executor::QueryExecutor;
use super::query::QuerySynthesizer;
use super::schema::SchemaIntrospector;
use super::state::{CompletedSession, Phase, PhaseOutput, SessionState};
use crate::ai::TextGenerator;
use crate::core::RetrievalPolicy;
use crate::index::SimilarityIndex;
use crate::store::SqlStore;

/// Orchestrates the question-to-answer pipeline.
///
/// Holds no per-question state; one engine serves any number of questions.
pub struct WorkflowEngine {
    introspector: SchemaIntrospector,
    retriever: EvidenceRetriever,
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    answerer: AnswerSynthesizer,
    retrieval_policy: RetrievalPolicy,
}

impl WorkflowEngine {
    /// Build an engine from explicit clients.
    pub fn new(
        store: Arc<dyn SqlStore>,
        index: Arc<dyn SimilarityIndex>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            introspector: SchemaIntrospector::new(store.clone()),
            retriever: EvidenceRetriever::new(index),
            synthesizer: QuerySynthesizer::new(generator.clone(), store.dialect()),
            executor: QueryExecutor::new(store),
            answerer: AnswerSynthesizer::new(generator),
            retrieval_policy: RetrievalPolicy::default(),
        }
    }

    /// Set how evidence retrieval faults are handled.
    pub fn with_retrieval_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.retrieval_policy = policy;
        self
    }

    /// Current schema description, as the retrieve phase would see it.
    pub async fn schema(&self) -> String {
        self.introspector.fetch().await
    }

    /// Run every phase for `question` and return the completed session.
    pub async fn run(&self, question: &str) -> PipelineResult<CompletedSession> {
        let mut state = SessionState::new(question);

        for phase in Phase::WORK {
            let span = tracing::info_span!("phase", phase = phase.name());
            let output = self.run_phase(phase, &state).instrument(span).await?;
            state.merge(output)?;
        }

        state.finish()
    }

    async fn run_phase(&self, phase: Phase, state: &SessionState) -> PipelineResult<PhaseOutput> {
        match phase {
            Phase::Retrieve => self.retrieve(state).await,
            Phase::SynthesizeQuery => {
                let draft = self
                    .synthesizer
                    .synthesize(state.question(), state.schema()?, state.evidence()?)
                    .await?;
                tracing::debug!(
                    reasoning = %draft.reasoning,
                    query = %draft.query,
                    "query synthesized"
                );
                Ok(PhaseOutput::QuerySynthesized(draft))
            }
            Phase::ExecuteQuery => {
                Ok(PhaseOutput::Executed(self.executor.execute(state.query()?).await))
            }
            Phase::SynthesizeAnswer => {
                let summary = state.outcome()?.summary();
                let answer = self
                    .answerer
                    .synthesize(state.question(), &summary)
                    .await
                    .map_err(PipelineError::Answer)?;
                Ok(PhaseOutput::Answered(answer))
            }
            Phase::Start | Phase::End => {
                Err(PipelineError::OutOfOrder { current: state.phase(), got: phase })
            }
        }
    }

    async fn retrieve(&self, state: &SessionState) -> PipelineResult<PhaseOutput> {
        let question = state.question();
        tracing::info!(question, "retrieving schema and policy evidence");

        let schema = self.introspector.fetch().await;

        let evidence = match self.retriever.retrieve(question).await {
            Ok(evidence) => evidence,
            Err(e) => match self.retrieval_policy {
                RetrievalPolicy::Propagate => return Err(PipelineError::Retrieval(e)),
                RetrievalPolicy::Empty => {
                    tracing::warn!(
                        error = %e,
                        "evidence retrieval failed; continuing without policy context"
                    );
                    String::new()
                }
            },
        };
        tracing::info!(evidence = %evidence, "policy evidence found");

        Ok(PhaseOutput::Retrieved { schema, evidence })
    }
}
