//! Session state threaded through the pipeline.
//!
//! A [`SessionState`] is created per question, filled in phase by phase, and
//! converted into a [`CompletedSession`] once the last phase has merged.

use std::fmt;

use serde::Serialize;

use super::error::{PipelineError, PipelineResult};
use super::executor::ExecutionOutcome;
use super::query::SqlDraft;
use crate::store::Row;

/// Pipeline phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Retrieve,
    SynthesizeQuery,
    ExecuteQuery,
    SynthesizeAnswer,
    End,
}

impl Phase {
    /// Phases that do work, in order.
    pub const WORK: [Phase; 4] =
        [Phase::Retrieve, Phase::SynthesizeQuery, Phase::ExecuteQuery, Phase::SynthesizeAnswer];

    /// The single successor of this phase.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Start => Some(Phase::Retrieve),
            Phase::Retrieve => Some(Phase::SynthesizeQuery),
            Phase::SynthesizeQuery => Some(Phase::ExecuteQuery),
            Phase::ExecuteQuery => Some(Phase::SynthesizeAnswer),
            Phase::SynthesizeAnswer => Some(Phase::End),
            Phase::End => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Retrieve => "retrieve",
            Phase::SynthesizeQuery => "synthesize_query",
            Phase::ExecuteQuery => "execute_query",
            Phase::SynthesizeAnswer => "synthesize_answer",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fields one phase contributes to the state.
///
/// Each variant carries exactly the fields its phase owns, so a phase cannot
/// overwrite anything it does not produce.
#[derive(Debug, Clone)]
pub enum PhaseOutput {
    Retrieved { schema: String, evidence: String },
    QuerySynthesized(SqlDraft),
    Executed(ExecutionOutcome),
    Answered(String),
}

impl PhaseOutput {
    /// Phase that produces this output.
    pub fn phase(&self) -> Phase {
        match self {
            PhaseOutput::Retrieved { .. } => Phase::Retrieve,
            PhaseOutput::QuerySynthesized(_) => Phase::SynthesizeQuery,
            PhaseOutput::Executed(_) => Phase::ExecuteQuery,
            PhaseOutput::Answered(_) => Phase::SynthesizeAnswer,
        }
    }
}

/// Per-question state while the pipeline is running.
#[derive(Debug, Clone)]
pub struct SessionState {
    question: String,
    phase: Phase,
    schema: Option<String>,
    evidence: Option<String>,
    reasoning: Option<String>,
    query: Option<String>,
    outcome: Option<ExecutionOutcome>,
    answer: Option<String>,
}

impl SessionState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            phase: Phase::Start,
            schema: None,
            evidence: None,
            reasoning: None,
            query: None,
            outcome: None,
            answer: None,
        }
    }

    /// Last phase whose output has been merged.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn schema(&self) -> PipelineResult<&str> {
        self.schema.as_deref().ok_or(PipelineError::MissingField("schema"))
    }

    pub fn evidence(&self) -> PipelineResult<&str> {
        self.evidence.as_deref().ok_or(PipelineError::MissingField("evidence"))
    }

    pub fn query(&self) -> PipelineResult<&str> {
        self.query.as_deref().ok_or(PipelineError::MissingField("query"))
    }

    pub fn outcome(&self) -> PipelineResult<&ExecutionOutcome> {
        self.outcome.as_ref().ok_or(PipelineError::MissingField("result_summary"))
    }

    /// Merge a phase's output.
    ///
    /// The output must come from the phase that follows the current one.
    /// Only the fields that phase owns are written.
    pub fn merge(&mut self, output: PhaseOutput) -> PipelineResult<()> {
        let got = output.phase();
        if self.phase.next() != Some(got) {
            return Err(PipelineError::OutOfOrder { current: self.phase, got });
        }

        match output {
            PhaseOutput::Retrieved { schema, evidence } => {
                self.schema = Some(schema);
                self.evidence = Some(evidence);
            }
            PhaseOutput::QuerySynthesized(draft) => {
                self.reasoning = Some(draft.reasoning);
                self.query = Some(draft.query);
            }
            PhaseOutput::Executed(outcome) => self.outcome = Some(outcome),
            PhaseOutput::Answered(answer) => self.answer = Some(answer),
        }

        self.phase = got;
        Ok(())
    }

    /// Close the session after the terminal phase.
    pub fn finish(self) -> PipelineResult<CompletedSession> {
        if self.phase != Phase::SynthesizeAnswer {
            return Err(PipelineError::OutOfOrder { current: self.phase, got: Phase::End });
        }

        let missing = PipelineError::MissingField;
        Ok(CompletedSession {
            question: self.question,
            schema: self.schema.ok_or(missing("schema"))?,
            evidence: self.evidence.ok_or(missing("evidence"))?,
            reasoning: self.reasoning.ok_or(missing("reasoning"))?,
            query: self.query.ok_or(missing("query"))?,
            outcome: self.outcome.ok_or(missing("result_summary"))?,
            answer: self.answer.ok_or(missing("answer"))?,
        })
    }
}

/// State after the terminal phase. Every field is populated.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedSession {
    pub question: String,
    pub schema: String,
    pub evidence: String,
    pub reasoning: String,
    pub query: String,
    pub outcome: ExecutionOutcome,
    pub answer: String,
}

impl CompletedSession {
    /// Result description handed to the answer phase.
    pub fn result_summary(&self) -> String {
        self.outcome.summary()
    }

    pub fn columns(&self) -> &[String] {
        self.outcome.columns()
    }

    pub fn rows(&self) -> &[Row] {
        self.outcome.rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> SqlDraft {
        SqlDraft { reasoning: "count rows".to_string(), query: "SELECT 1".to_string() }
    }

    fn retrieved() -> PhaseOutput {
        PhaseOutput::Retrieved { schema: "TABLE: t".to_string(), evidence: "rule".to_string() }
    }

    #[test]
    fn test_phase_order_is_linear() {
        let mut phase = Phase::Start;
        let mut visited = Vec::new();
        while let Some(next) = phase.next() {
            visited.push(next);
            phase = next;
        }
        assert_eq!(
            visited,
            vec![
                Phase::Retrieve,
                Phase::SynthesizeQuery,
                Phase::ExecuteQuery,
                Phase::SynthesizeAnswer,
                Phase::End
            ]
        );
        assert_eq!(&visited[..4], &Phase::WORK[..]);
    }

    #[test]
    fn test_merge_is_additive() {
        let mut state = SessionState::new("How many?");
        state.merge(retrieved()).unwrap();
        state.merge(PhaseOutput::QuerySynthesized(draft())).unwrap();

        assert_eq!(state.question(), "How many?");
        assert_eq!(state.schema().unwrap(), "TABLE: t");
        assert_eq!(state.evidence().unwrap(), "rule");
        assert_eq!(state.query().unwrap(), "SELECT 1");
        assert_eq!(state.phase(), Phase::SynthesizeQuery);
    }

    #[test]
    fn test_merge_rejects_out_of_order_output() {
        let mut state = SessionState::new("q");
        let err = state.merge(PhaseOutput::Answered("a".to_string())).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::OutOfOrder { current: Phase::Start, got: Phase::SynthesizeAnswer }
        ));
        assert_eq!(state.phase(), Phase::Start);
    }

    #[test]
    fn test_merge_rejects_repeated_phase() {
        let mut state = SessionState::new("q");
        state.merge(retrieved()).unwrap();
        assert!(state.merge(retrieved()).is_err());
    }

    #[test]
    fn test_read_before_produced() {
        let state = SessionState::new("q");
        assert!(matches!(state.query(), Err(PipelineError::MissingField("query"))));
    }

    #[test]
    fn test_finish_requires_terminal_phase() {
        let mut state = SessionState::new("q");
        state.merge(retrieved()).unwrap();
        assert!(state.finish().is_err());
    }

    #[test]
    fn test_finish_populates_every_field() {
        let mut state = SessionState::new("q");
        state.merge(retrieved()).unwrap();
        state.merge(PhaseOutput::QuerySynthesized(draft())).unwrap();
        state.merge(PhaseOutput::Executed(ExecutionOutcome::Empty)).unwrap();
        state.merge(PhaseOutput::Answered("none".to_string())).unwrap();

        let session = state.finish().unwrap();
        assert_eq!(session.answer, "none");
        assert_eq!(session.reasoning, "count rows");
        assert!(session.rows().is_empty());
        assert!(session.columns().is_empty());
        assert!(!session.result_summary().is_empty());
    }
}
