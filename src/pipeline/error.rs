//! Pipeline error types.

use thiserror::Error;

use super::state::Phase;
use crate::ai::AIError;
use crate::index::IndexError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Query synthesis failures.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The generation service could not be reached or returned nothing.
    #[error("Query generation failed: {0}")]
    Generation(#[from] AIError),

    /// The service answered, but not with the `{reasoning, query}` record.
    #[error("Query generation returned an invalid result: {0}")]
    ContractViolation(String),
}

/// Faults that abort a single question.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Policy retrieval failed and the retrieval policy is `propagate`.
    #[error("Evidence retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    /// Query synthesis failed.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// Answer synthesis could not reach the generation service.
    #[error("Answer generation failed: {0}")]
    Answer(#[source] AIError),

    /// A phase ran before the field it reads was produced.
    #[error("Field '{0}' read before it was produced")]
    MissingField(&'static str),

    /// A phase output arrived out of order.
    #[error("Phase {got} cannot follow {current}")]
    OutOfOrder { current: Phase, got: Phase },
}
