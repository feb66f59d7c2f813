//! Error taxonomy for the generation pipeline.
//!
//! Every failure mode the pipeline can hit maps to one of four variants:
//!
//! | Variant | Meaning | Recovery |
//! |---------|---------|----------|
//! | [`PipelineError::NotFound`] | a referenced article does not exist | fatal, propagated |
//! | [`PipelineError::Parse`] | the model response violates the marker/JSON protocol | retried by the orchestrator, then fatal |
//! | [`PipelineError::Provider`] | transport/auth/rate-limit failure from an LLM API | fatal at the client layer |
//! | [`PipelineError::Db`] | storage failure, including slug uniqueness violations | fatal, untranslated |
//!
//! CLI and server adapters wrap these in `anyhow` at the boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A referenced article (by title or id) does not exist.
    #[error("article not found: {0}")]
    NotFound(String),

    /// The model response does not follow the marker/JSON protocol.
    /// Carries enough of the offending text for diagnosis.
    #[error("malformed completion: {0}")]
    Parse(String),

    /// Transport, auth, or rate-limit failure from an LLM provider.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// Storage-layer failure. Slug uniqueness violations surface here
    /// as the underlying constraint error, untranslated.
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl PipelineError {
    /// Whether the orchestrator's bounded retry loop may re-attempt
    /// after this error. Only protocol violations qualify; provider and
    /// storage failures propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Parse(_))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
