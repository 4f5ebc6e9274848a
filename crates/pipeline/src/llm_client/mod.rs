//! Model client — the single point of entry for all model calls in the
//! pipeline.
//!
//! ARCHITECTURAL RULE: no other module may talk to the Anthropic API
//! directly. Everything goes through `ModelInvoker`, so tests can swap in a
//! scripted fake and the retry/timeout policy lives in exactly one place
//! (`invoke_with_retry`).
//!
//! Model: claude-sonnet-4-5 (hardcoded — do not make configurable to
//! prevent drift)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all structuring calls.
/// Intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
/// Structuring must be reproducible, so sampling stays pinned to zero.
const TEMPERATURE: f32 = 0.0;
/// Transport-level ceiling; the per-attempt deadline callers care about is
/// enforced in `invoke_with_retry`.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fully assembled prompt pair, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Verbatim model reply plus usage accounting. The text is untrusted input
/// to the validator; nothing here is assumed to be JSON yet.
#[derive(Debug, Clone)]
pub struct RawModelOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// One model attempt, classified by what the caller can do about it.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Transport failure, timeout, or 5xx. Worth retrying.
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// 429 from the API. Worth retrying after backoff.
    #[error("model rate limited")]
    RateLimited,

    /// The model answered and said no: 4xx, policy rejection, or empty
    /// content. Retrying the same input will not help.
    #[error("model refused: {0}")]
    Refused(String),
}

/// A single model attempt. Implementations must not retry internally —
/// `invoke_with_retry` owns the retry and timeout policy.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, input: &ModelInput) -> Result<RawModelOutput, InvokeError>;
}

/// Terminal invocation failure: the last error seen plus how many attempts
/// were actually made.
#[derive(Debug)]
pub struct InvokeFailure {
    pub error: InvokeError,
    pub attempts: u32,
}

/// Drives any invoker through the retry policy: per-attempt timeout,
/// exponential backoff (1s, 2s, 4s), at most `budget` attempts in total.
/// `Refused` is terminal immediately; a timed-out attempt is abandoned and
/// counts against the budget.
pub async fn invoke_with_retry(
    model: &dyn ModelInvoker,
    input: &ModelInput,
    budget: u32,
    per_attempt_timeout: Duration,
) -> Result<RawModelOutput, InvokeFailure> {
    let budget = budget.max(1);
    let mut last_error = InvokeError::Unavailable("no attempt made".to_string());

    for attempt in 0..budget {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s; exponent capped so oversized
            // budgets cannot overflow the shift
            let delay = Duration::from_millis(1000 * (1u64 << (attempt - 1).min(20)));
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "model attempt failed, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
        }

        let result = match tokio::time::timeout(per_attempt_timeout, model.invoke(input)).await {
            Ok(result) => result,
            Err(_) => Err(InvokeError::Unavailable(format!(
                "model call timed out after {}ms",
                per_attempt_timeout.as_millis()
            ))),
        };

        match result {
            Ok(output) => return Ok(output),
            Err(InvokeError::Refused(detail)) => {
                return Err(InvokeFailure {
                    error: InvokeError::Refused(detail),
                    attempts: attempt + 1,
                });
            }
            Err(error) => last_error = error,
        }
    }

    Err(InvokeFailure {
        error: last_error,
        attempts: budget,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic HTTP implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Production `ModelInvoker` over the Anthropic Messages API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(TRANSPORT_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[async_trait]
impl ModelInvoker for LlmClient {
    async fn invoke(&self, input: &ModelInput) -> Result<RawModelOutput, InvokeError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: &input.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &input.user,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| InvokeError::Unavailable(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            warn!("model API rate limited the request");
            return Err(InvokeError::RateLimited);
        }

        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "model API returned server error");
            return Err(InvokeError::Unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(InvokeError::Refused(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::Unavailable(format!("invalid response body: {e}")))?;

        let text = parsed
            .text()
            .ok_or_else(|| InvokeError::Refused("model returned empty content".to_string()))?
            .to_string();

        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "model call succeeded"
        );

        Ok(RawModelOutput {
            text,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedInvoker {
        responses: Mutex<Vec<Result<RawModelOutput, InvokeError>>>,
        calls: AtomicU32,
    }

    impl ScriptedInvoker {
        fn new(responses: Vec<Result<RawModelOutput, InvokeError>>) -> Self {
            let mut responses = responses;
            responses.reverse(); // pop from the back in order
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(&self, _input: &ModelInput) -> Result<RawModelOutput, InvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(InvokeError::RateLimited))
        }
    }

    struct HangingInvoker;

    #[async_trait]
    impl ModelInvoker for HangingInvoker {
        async fn invoke(&self, _input: &ModelInput) -> Result<RawModelOutput, InvokeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(InvokeError::Unavailable("unreachable".to_string()))
        }
    }

    fn make_input() -> ModelInput {
        ModelInput {
            system: "system".to_string(),
            user: "user".to_string(),
        }
    }

    fn ok_output(text: &str) -> Result<RawModelOutput, InvokeError> {
        Ok(RawModelOutput {
            text: text.to_string(),
            usage: TokenUsage::default(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let model = ScriptedInvoker::new(vec![
            Err(InvokeError::Unavailable("connect reset".into())),
            Err(InvokeError::RateLimited),
            ok_output("{}"),
        ]);

        let out = invoke_with_retry(&model, &make_input(), 3, Duration::from_secs(45))
            .await
            .unwrap();

        assert_eq!(out.text, "{}");
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_is_terminal_on_first_attempt() {
        let model = ScriptedInvoker::new(vec![Err(InvokeError::Refused("policy".into()))]);

        let failure = invoke_with_retry(&model, &make_input(), 3, Duration::from_secs(45))
            .await
            .unwrap_err();

        assert_eq!(model.calls(), 1, "refusals must not be retried");
        assert_eq!(failure.attempts, 1);
        assert!(matches!(failure.error, InvokeError::Refused(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_reports_last_error() {
        let model = ScriptedInvoker::new(vec![
            Err(InvokeError::Unavailable("503".into())),
            Err(InvokeError::Unavailable("503".into())),
            Err(InvokeError::RateLimited),
        ]);

        let failure = invoke_with_retry(&model, &make_input(), 3, Duration::from_secs(45))
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, InvokeError::RateLimited));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_ladder_is_one_two_four_seconds() {
        let model = ScriptedInvoker::new(vec![
            Err(InvokeError::Unavailable("down".into())),
            Err(InvokeError::Unavailable("down".into())),
            Err(InvokeError::Unavailable("down".into())),
        ]);

        let started = tokio::time::Instant::now();
        let _ = invoke_with_retry(&model, &make_input(), 3, Duration::from_secs(45)).await;

        // failures are instant, so elapsed time is backoff only: 1s + 2s
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempts_time_out_and_consume_budget() {
        let model = HangingInvoker;

        let failure = invoke_with_retry(&model, &make_input(), 2, Duration::from_secs(45))
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 2);
        match failure.error {
            InvokeError::Unavailable(detail) => {
                assert!(detail.contains("timed out"), "detail: {detail}")
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_still_makes_one_attempt() {
        let model = ScriptedInvoker::new(vec![ok_output("{}")]);
        let out = invoke_with_retry(&model, &make_input(), 0, Duration::from_secs(45)).await;
        assert!(out.is_ok());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_budget_exhausts_without_backoff_overflow() {
        // empty script: every attempt is rate limited
        let model = ScriptedInvoker::new(Vec::new());

        let failure = invoke_with_retry(&model, &make_input(), 70, Duration::from_secs(45))
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 70);
        assert_eq!(model.calls(), 70);
        assert!(matches!(failure.error, InvokeError::RateLimited));
    }
}
