//! Pipeline orchestration — one call from raw sources to a structured
//! resume plus its decision log.
//!
//! Flow:
//! 1. Clean the resume text (encoding junk, whitespace, sensitive numbers)
//! 2. Assemble the prompt pair (precondition check lives here)
//! 3. Invoke the model with retry, backoff, and a per-attempt timeout
//! 4. Parse, repair, and validate the output against the canonical schema
//! 5. Re-apply the deterministic normalization rules
//! 6. Audit every output token against the source corpus
//! 7. Build the decision log from the model's entries plus applied changes
//!
//! A `Pipeline` is immutable after construction; concurrent `structure`
//! calls share the alias table and system prompt read-only. Dropping the
//! returned future cancels the in-flight model call, so cancellation never
//! leaves a partial result behind.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::assemble::{assemble_input, load_system_prompt, STRUCTURING_SYSTEM};
use crate::config::Config;
use crate::decision::build_log;
use crate::errors::PipelineError;
use crate::grounding::{self, SourceCorpus};
use crate::llm_client::{invoke_with_retry, InvokeError, LlmClient, ModelInvoker, TokenUsage};
use crate::normalize::{apply_post_pass, clean_source_text, AliasTable};
use crate::schema::{CanonicalResume, DecisionLogEntry, Source};
use crate::sources::{EnrichmentSnapshot, SourceDocument};
use crate::validate::parse_and_validate;

/// How much prose the model is asked for. Folded into the prompt rules, not
/// enforced after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Concise,
    Standard,
    Detailed,
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Verbosity::Concise => "concise",
            Verbosity::Standard => "standard",
            Verbosity::Detailed => "detailed",
        })
    }
}

/// Per-invocation knobs. Everything has a sensible default; callers usually
/// tweak at most one field.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureOptions {
    /// Upper bound on projects in the output; least relevant are dropped.
    pub max_projects: usize,
    /// Total model attempts, including the first.
    pub retry_budget: u32,
    /// Deadline for each individual model attempt.
    pub model_timeout: Duration,
    /// Upper bound on highlight bullets kept per project after merging.
    pub highlight_cap: usize,
    /// Language the resume content should be written in, if not English.
    pub output_language: Option<String>,
    pub verbosity: Option<Verbosity>,
}

impl Default for StructureOptions {
    fn default() -> Self {
        Self {
            max_projects: 8,
            retry_budget: 3,
            model_timeout: Duration::from_secs(45),
            highlight_cap: 6,
            output_language: None,
            verbosity: None,
        }
    }
}

/// Everything a single structuring run consumes. Inputs are frozen values:
/// the run never mutates them and holds no reference past its return.
#[derive(Debug, Clone, Default)]
pub struct StructureRequest {
    pub resume: Option<SourceDocument>,
    pub enrichment: Option<EnrichmentSnapshot>,
    pub custom_instructions: Option<String>,
    pub options: StructureOptions,
}

/// The atomic result pair plus token accounting for the one model call.
#[derive(Debug, Clone)]
pub struct StructureOutcome {
    pub resume: CanonicalResume,
    pub decision_log: Vec<DecisionLogEntry>,
    pub usage: TokenUsage,
}

/// Resume structuring pipeline. Construct once, share via `Arc`, call
/// [`structure`](Pipeline::structure) per resume.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn ModelInvoker>,
    aliases: AliasTable,
    system_prompt: String,
}

impl Pipeline {
    pub fn new(model: Arc<dyn ModelInvoker>) -> Self {
        Self {
            model,
            aliases: AliasTable::default(),
            system_prompt: STRUCTURING_SYSTEM.to_string(),
        }
    }

    /// Production wiring: Anthropic client from the environment config,
    /// system prompt from the configured override file when present.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(LlmClient::new(config.anthropic_api_key.clone())))
            .with_system_prompt(load_system_prompt(config.system_prompt_path.as_deref()))
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Runs the full pipeline for one resume. Single-pass: one model call,
    /// then pure in-process transformation. Either a complete
    /// `(resume, decision log)` pair comes back or a typed error does —
    /// never a partial resume.
    pub async fn structure(
        &self,
        request: StructureRequest,
    ) -> Result<StructureOutcome, PipelineError> {
        let invocation = Uuid::new_v4();
        let StructureRequest {
            resume,
            enrichment,
            custom_instructions,
            options,
        } = request;

        let resume = resume.map(|doc| {
            let cleaned = clean_source_text(&doc.text);
            SourceDocument {
                character_count: Some(cleaned.chars().count()),
                text: cleaned,
                warnings: doc.warnings,
            }
        });

        info!(
            invocation = %invocation,
            has_resume = resume.is_some(),
            has_enrichment = enrichment.is_some(),
            "structuring run started"
        );

        let input = assemble_input(
            resume.as_ref(),
            enrichment.as_ref(),
            custom_instructions.as_deref(),
            &options,
            &self.system_prompt,
        )?;
        debug!(
            invocation = %invocation,
            prompt_chars = input.user.chars().count(),
            "prompt assembled"
        );

        let raw = invoke_with_retry(
            self.model.as_ref(),
            &input,
            options.retry_budget,
            options.model_timeout,
        )
        .await
        .map_err(|failure| match failure.error {
            InvokeError::Unavailable(detail) => PipelineError::ModelUnavailable {
                attempts: failure.attempts,
                detail,
            },
            InvokeError::RateLimited => PipelineError::ModelRateLimited {
                attempts: failure.attempts,
            },
            InvokeError::Refused(detail) => PipelineError::ModelRefused(detail),
        })?;
        debug!(
            invocation = %invocation,
            input_tokens = raw.usage.input_tokens,
            output_tokens = raw.usage.output_tokens,
            "model responded"
        );

        let (mut structured, raw_log) = match parse_and_validate(&raw) {
            Ok(pair) => pair,
            Err(err) => {
                // diagnostics only; the raw text never rides inside the error
                debug!(
                    invocation = %invocation,
                    raw = %raw.text,
                    "model output failed validation"
                );
                return Err(err);
            }
        };

        let input_source = input_source(
            resume.as_ref().is_some_and(|doc| !doc.text.trim().is_empty()),
            enrichment.is_some(),
        );
        let records = apply_post_pass(
            &mut structured,
            &self.aliases,
            options.max_projects,
            options.highlight_cap,
            input_source,
        );
        debug!(
            invocation = %invocation,
            normalizations = records.len(),
            "deterministic post-pass applied"
        );

        let corpus = SourceCorpus::build(resume.as_ref(), enrichment.as_ref(), &self.aliases);
        let violations = grounding::audit(&structured, &corpus);
        if !violations.is_empty() {
            let sample: Vec<String> = violations
                .iter()
                .take(5)
                .map(|v| format!("{}: '{}'", v.field, v.token))
                .collect();
            error!(
                invocation = %invocation,
                violations = violations.len(),
                sample = ?sample,
                "output contains values with no traceable source"
            );
            return Err(PipelineError::InternalInvariant(format!(
                "{} ungrounded token(s) in output, first: {}",
                violations.len(),
                sample.join(", ")
            )));
        }

        let decision_log = build_log(raw_log, &records);

        info!(
            invocation = %invocation,
            projects = structured.projects.len(),
            decisions = decision_log.len(),
            input_tokens = raw.usage.input_tokens,
            output_tokens = raw.usage.output_tokens,
            "structuring run finished"
        );

        Ok(StructureOutcome {
            resume: structured,
            decision_log,
            usage: raw.usage,
        })
    }
}

/// Which inputs this run actually had, for labeling records that carry no
/// per-item provenance. Blank resume text counts as absent, matching the
/// assembly precondition.
fn input_source(has_resume: bool, has_enrichment: bool) -> Source {
    match (has_resume, has_enrichment) {
        (true, true) => Source::Both,
        (false, true) => Source::Github,
        _ => Source::Resume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::llm_client::{ModelInput, RawModelOutput};
    use crate::schema::{Confidence, DecisionAction};
    use crate::sources::{GithubProfile, RepositoryRecord};

    #[test]
    fn test_default_options() {
        let options = StructureOptions::default();
        assert_eq!(options.max_projects, 8);
        assert_eq!(options.retry_budget, 3);
        assert_eq!(options.model_timeout, Duration::from_secs(45));
        assert_eq!(options.highlight_cap, 6);
        assert!(options.output_language.is_none());
        assert!(options.verbosity.is_none());
    }

    #[test]
    fn test_verbosity_renders_lowercase() {
        assert_eq!(Verbosity::Concise.to_string(), "concise");
        assert_eq!(Verbosity::Standard.to_string(), "standard");
        assert_eq!(Verbosity::Detailed.to_string(), "detailed");
        assert_eq!(
            serde_json::to_string(&Verbosity::Detailed).unwrap(),
            "\"detailed\""
        );
    }

    #[test]
    fn test_input_source_labeling() {
        assert_eq!(input_source(true, true), Source::Both);
        assert_eq!(input_source(true, false), Source::Resume);
        assert_eq!(input_source(false, true), Source::Github);
    }

    // ────────────────────────────────────────────────────────────────────────
    // End-to-end runs against a scripted model
    // ────────────────────────────────────────────────────────────────────────

    struct ScriptedModel {
        responses: Mutex<Vec<Result<RawModelOutput, InvokeError>>>,
        calls: AtomicU32,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<RawModelOutput, InvokeError>>) -> Arc<Self> {
            let mut responses = responses;
            responses.reverse(); // pop from the back in order
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedModel {
        async fn invoke(&self, _input: &ModelInput) -> Result<RawModelOutput, InvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(InvokeError::RateLimited))
        }
    }

    /// Wires a scripted model into a pipeline. Logs stay quiet unless
    /// RUST_LOG is set, so a failing scenario can be replayed verbosely.
    fn pipeline_for(model: Arc<ScriptedModel>) -> Pipeline {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        Pipeline::new(model)
    }

    fn reply(text: impl Into<String>) -> Result<RawModelOutput, InvokeError> {
        Ok(RawModelOutput {
            text: text.into(),
            usage: TokenUsage {
                input_tokens: 900,
                output_tokens: 400,
            },
        })
    }

    fn resume_doc() -> SourceDocument {
        SourceDocument::new(
            "Ada Example\nada@example.com\n\
             Skills: react.js, Python, postgres\n\
             Projects: Task Tracker - CLI tool to track tasks, built in Rust",
        )
    }

    fn tracker_snapshot() -> EnrichmentSnapshot {
        EnrichmentSnapshot {
            profile: GithubProfile {
                username: "adaex".to_string(),
                name: Some("Ada Example".to_string()),
                bio: None,
                location: None,
                email: None,
                blog: None,
                company: None,
                html_url: Some("https://github.com/adaex".to_string()),
                public_repos: 3,
                followers: 10,
            },
            repositories: vec![RepositoryRecord {
                name: "task-tracker".to_string(),
                description: Some("CLI tracker with persistence layer".to_string()),
                url: Some("https://github.com/adaex/task-tracker".to_string()),
                languages: vec!["Rust".to_string()],
                topics: vec![],
                stars: 4,
                forks: 0,
                created_at: None,
                pushed_at: None,
                readme_excerpt: None,
            }],
            fetched_at: None,
        }
    }

    fn payload(resume_fields: Value, decision_log: Value) -> String {
        let mut resume = json!({
            "contact": { "full_name": "Ada Example", "email": "ada@example.com" }
        });
        if let (Some(base), Some(extra)) = (resume.as_object_mut(), resume_fields.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        json!({ "structured_resume": resume, "decision_log": decision_log }).to_string()
    }

    #[tokio::test]
    async fn test_no_sources_fails_before_any_model_call() {
        let model = ScriptedModel::new(vec![reply("{}")]);
        let pipeline = pipeline_for(model.clone());

        let err = pipeline
            .structure(StructureRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Precondition(_)));
        assert_eq!(model.calls(), 0, "precondition failures must not invoke the model");
    }

    #[tokio::test]
    async fn test_skill_aliases_are_normalized_and_logged() {
        let model = ScriptedModel::new(vec![reply(payload(
            json!({
                "technical_skills": {
                    "languages": ["Python"],
                    "frameworks_libraries": ["react.js"],
                    "databases": ["postgres"]
                }
            }),
            json!([]),
        ))]);
        let pipeline = pipeline_for(model);

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap();

        let skills = &outcome.resume.technical_skills;
        assert_eq!(skills.languages, vec!["Python"]);
        assert_eq!(skills.frameworks_libraries, vec!["React"]);
        assert_eq!(skills.databases, vec!["PostgreSQL"]);

        // the model logged nothing, so every table hit must be synthesized,
        // including "Python" which was already in canonical form
        assert_eq!(outcome.decision_log.len(), 3);
        for entry in &outcome.decision_log {
            assert_eq!(entry.section, "technical_skills");
            assert_eq!(entry.action, DecisionAction::Normalized);
            assert_eq!(entry.confidence, Confidence::High);
            assert_eq!(entry.source, Source::Resume);
        }
        let logged: Vec<&[String]> = outcome
            .decision_log
            .iter()
            .map(|e| e.items.as_slice())
            .collect();
        assert!(logged.contains(&["Python".to_string()].as_slice()));
        assert!(logged.contains(&["react.js".to_string(), "React".to_string()].as_slice()));
        assert!(logged.contains(&["postgres".to_string(), "PostgreSQL".to_string()].as_slice()));
    }

    #[tokio::test]
    async fn test_same_project_from_both_sources_is_merged() {
        let model = ScriptedModel::new(vec![reply(payload(
            json!({
                "projects": [
                    {
                        "name": "Task Tracker",
                        "description": "CLI tool to track tasks",
                        "technologies": ["Rust"],
                        "source": "resume"
                    },
                    {
                        "name": "task-tracker",
                        "description": "CLI tracker with persistence layer",
                        "technologies": ["Rust"],
                        "source": "github",
                        "url": "https://github.com/adaex/task-tracker"
                    }
                ]
            }),
            json!([]),
        ))]);
        let pipeline = pipeline_for(model);

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                enrichment: Some(tracker_snapshot()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.resume.projects.len(), 1);
        let project = &outcome.resume.projects[0];
        assert_eq!(project.name, "Task Tracker", "resume casing wins the name");
        assert_eq!(project.source, Source::Both);
        assert_eq!(
            project.url.as_deref(),
            Some("https://github.com/adaex/task-tracker")
        );
        assert_eq!(
            project.description, "CLI tracker with persistence layer",
            "richer description wins"
        );

        let merged: Vec<_> = outcome
            .decision_log
            .iter()
            .filter(|e| e.action == DecisionAction::Merged)
            .collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, Source::Both);
        assert!(merged[0].items.contains(&"Task Tracker".to_string()));

        assert!(
            crate::validate::validate_resume(&outcome.resume).is_empty(),
            "success-path output must satisfy the canonical schema"
        );
    }

    #[tokio::test]
    async fn test_trailing_prose_around_payload_is_repaired() {
        let body = payload(json!({}), json!([]));
        let model = ScriptedModel::new(vec![reply(format!(
            "Here is the structured resume:\n{body}\nLet me know if anything needs adjusting."
        ))]);
        let pipeline = pipeline_for(model);

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.resume.contact.full_name, "Ada Example");
        assert!(outcome.decision_log.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_malformed_output() {
        let model = ScriptedModel::new(vec![reply(
            "I cannot structure this resume, sorry about that.",
        )]);
        let pipeline = pipeline_for(model.clone());

        let err = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedOutput(_)));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_model_unavailable() {
        let model = ScriptedModel::new(vec![
            Err(InvokeError::Unavailable("503".into())),
            Err(InvokeError::Unavailable("503".into())),
            Err(InvokeError::Unavailable("503".into())),
        ]);
        let pipeline = pipeline_for(model.clone());

        let err = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            PipelineError::ModelUnavailable { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_refusal_is_terminal_after_one_call() {
        let model = ScriptedModel::new(vec![Err(InvokeError::Refused("policy".into()))]);
        let pipeline = pipeline_for(model.clone());

        let err = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ModelRefused(_)));
        assert!(!err.caller_may_retry());
        assert_eq!(model.calls(), 1, "refusals must not be retried");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success_recovers() {
        let model = ScriptedModel::new(vec![
            Err(InvokeError::RateLimited),
            reply(payload(json!({}), json!([]))),
        ]);
        let pipeline = pipeline_for(model.clone());

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.resume.contact.full_name, "Ada Example");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_fabricated_skill_fails_the_run() {
        let model = ScriptedModel::new(vec![reply(payload(
            json!({ "technical_skills": { "languages": ["Haskell"] } }),
            json!([]),
        ))]);
        let pipeline = pipeline_for(model);

        let err = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            PipelineError::InternalInvariant(detail) => {
                assert!(detail.contains("haskell"), "detail: {detail}")
            }
            other => panic!("expected InternalInvariant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_contact_is_a_schema_violation() {
        let model = ScriptedModel::new(vec![reply(
            json!({
                "structured_resume": { "summary": "Ada Example" },
                "decision_log": []
            })
            .to_string(),
        )]);
        let pipeline = pipeline_for(model);

        let err = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn test_invalid_log_entries_are_dropped_not_fatal() {
        let model = ScriptedModel::new(vec![reply(payload(
            json!({}),
            json!([
                {
                    "section": "projects",
                    "action": "Included",
                    "items": "Task Tracker",
                    "reason": "Listed on the resume",
                    "source": "Resume",
                    "confidence": "High"
                },
                { "action": "included" },
                "not even an object"
            ]),
        ))]);
        let pipeline = pipeline_for(model);

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(resume_doc()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.decision_log.len(), 1);
        let entry = &outcome.decision_log[0];
        assert_eq!(entry.action, DecisionAction::Included);
        assert_eq!(entry.items, vec!["Task Tracker"]);
        assert_eq!(entry.source, Source::Resume);
    }

    #[tokio::test]
    async fn test_project_budget_drops_tail_and_logs_exclusion() {
        let doc = SourceDocument::new(
            "Ada Example\nada@example.com\n\
             Projects: Alpha Parser, Beta Cache, Gamma Proxy. All built in Rust.",
        );
        let project = |name: &str| {
            json!({
                "name": name,
                "description": "Built in Rust",
                "technologies": ["Rust"],
                "source": "resume"
            })
        };
        let model = ScriptedModel::new(vec![reply(payload(
            json!({
                "projects": [project("Alpha Parser"), project("Beta Cache"), project("Gamma Proxy")]
            }),
            json!([]),
        ))]);
        let pipeline = pipeline_for(model);

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(doc),
                options: StructureOptions {
                    max_projects: 2,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();

        let names: Vec<&str> = outcome
            .resume
            .projects
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha Parser", "Beta Cache"]);

        let excluded: Vec<_> = outcome
            .decision_log
            .iter()
            .filter(|e| e.action == DecisionAction::Excluded)
            .collect();
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].items, vec!["Gamma Proxy"]);
        assert_eq!(excluded[0].confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_blank_resume_with_enrichment_still_proceeds() {
        let model = ScriptedModel::new(vec![reply(
            json!({
                "structured_resume": {
                    "contact": {},
                    "projects": [{
                        "name": "task-tracker",
                        "description": "CLI tracker with persistence layer",
                        "technologies": ["Rust"],
                        "source": "github",
                        "url": "https://github.com/adaex/task-tracker"
                    }]
                },
                "decision_log": []
            })
            .to_string(),
        )]);
        let pipeline = pipeline_for(model.clone());

        let outcome = pipeline
            .structure(StructureRequest {
                resume: Some(SourceDocument::new("   ")),
                enrichment: Some(tracker_snapshot()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(model.calls(), 1);
        assert_eq!(outcome.resume.contact.full_name, "");
        assert_eq!(outcome.resume.projects.len(), 1);
        assert_eq!(outcome.resume.projects[0].source, Source::Github);
    }
}
