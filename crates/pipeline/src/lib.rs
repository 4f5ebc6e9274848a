//! Resume structuring pipeline.
//!
//! Takes extracted resume text and/or a GitHub enrichment snapshot, makes
//! one generative-model call under a strict output contract, then validates,
//! repairs, normalizes, and audits the result into a canonical resume plus a
//! decision log explaining every transformation applied along the way.
//!
//! Entry point: [`Pipeline::structure`].

pub mod assemble;
pub mod config;
pub mod decision;
pub mod errors;
pub mod grounding;
pub mod llm_client;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod sources;
pub mod validate;

pub use config::Config;
pub use errors::PipelineError;
pub use llm_client::{
    InvokeError, LlmClient, ModelInput, ModelInvoker, RawModelOutput, TokenUsage,
};
pub use normalize::AliasTable;
pub use pipeline::{Pipeline, StructureOptions, StructureOutcome, StructureRequest, Verbosity};
pub use schema::{CanonicalResume, DecisionLogEntry, StructuredOutput};
pub use sources::{EnrichmentSnapshot, GithubProfile, RepositoryRecord, SourceDocument};
