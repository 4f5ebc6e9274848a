//! Pipeline error taxonomy.
//!
//! Every failure that crosses the crate boundary is exactly one of these
//! kinds; transport-level errors (`reqwest`, `serde_json`) never escape
//! unwrapped. Raw model output is never embedded in an error — it goes to
//! the debug log under the invocation id instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input contract violated before any work happened: no usable source,
    /// blank resume text. Never retried internally.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The model could not be reached or answered 5xx / timed out, and the
    /// retry budget is spent.
    #[error("model unavailable after {attempts} attempts: {detail}")]
    ModelUnavailable { attempts: u32, detail: String },

    /// The model kept rate-limiting past the retry budget.
    #[error("model rate limited after {attempts} attempts")]
    ModelRateLimited { attempts: u32 },

    /// The model answered but declined to produce usable output (refusal,
    /// policy rejection, empty content). Retrying the same input is
    /// pointless, so we don't.
    #[error("model refused to produce output: {0}")]
    ModelRefused(String),

    /// The payload never parsed as the two-part structure (resume plus
    /// decision log), even after the repair chain.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// The payload parsed but failed canonical-schema validation after
    /// repair. The message lists every issue found.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// A value with no traceable source survived into the output, or some
    /// other internal contract broke. Logged at error level; a bug in this
    /// crate or a model contract breach, not a caller mistake.
    #[error("internal invariant violation: {0}")]
    InternalInvariant(String),
}

impl PipelineError {
    /// Whether the caller retrying the whole invocation could plausibly
    /// succeed. True only for transient model-side failures.
    pub fn caller_may_retry(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelUnavailable { .. } | PipelineError::ModelRateLimited { .. }
        )
    }
}
