//! Model Client Adapter
//!
//! Wraps any [`ChatProvider`] with the call policy shared by every vendor:
//! native JSON mode with a sticky plain-text fallback, bounded retries with
//! backoff, per-attempt token budgets and a circuit breaker for fatal
//! failures such as an exhausted account balance.

use crate::retry::RetryPolicy;
use paperkg_domain::traits::ChatProvider;
use paperkg_domain::{ChatOutcome, ChatReply, ChatRequest, ProviderFailure, TokenUsage};
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Completion-token cap policy across attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenBudget {
    /// Send no cap; the vendor default applies
    #[default]
    Unset,

    /// Same cap on every attempt
    Fixed(u32),

    /// Start at `base` and double on each retry, never exceeding `cap`
    Doubling {
        /// Cap for the first attempt
        base: u32,
        /// Upper bound
        cap: u32,
    },
}

impl TokenBudget {
    /// Cap to request on attempt `attempt_index` (0-based)
    pub fn for_attempt(&self, attempt_index: u32) -> Option<u32> {
        match *self {
            TokenBudget::Unset => None,
            TokenBudget::Fixed(n) => Some(n),
            TokenBudget::Doubling { base, cap } => {
                let factor = 2u32.saturating_pow(attempt_index);
                Some(base.saturating_mul(factor).min(cap))
            }
        }
    }
}

/// Per-request settings applied to every call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// System message
    pub system_prompt: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Completion-token policy
    pub token_budget: TokenBudget,

    /// Ask for native JSON output first
    pub prefer_json: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: None,
            token_budget: TokenBudget::Unset,
            prefer_json: true,
        }
    }
}

/// A successful call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    /// Value produced by the accept function
    pub value: T,

    /// Raw reply text
    pub raw: String,

    /// Token usage of the successful attempt, if reported
    pub usage: Option<TokenUsage>,

    /// Attempts used (1-based)
    pub attempts: u32,

    /// Finish reason of the successful attempt
    pub finish_reason: Option<String>,

    /// Completion-token cap sent on the successful attempt
    pub max_tokens: Option<u32>,

    /// Whether the successful attempt ran in native JSON mode
    pub json_mode: bool,
}

/// Final outcome of [`ModelClient::call_with`]
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// A reply was produced and accepted
    Completed(Completion<T>),

    /// Every attempt failed with a retryable error
    Failed {
        /// Last error message
        error: String,
        /// Attempts used
        attempts: u32,
        /// Most recent reply text that was rejected, if any
        last_raw: Option<String>,
    },

    /// A fatal failure stopped retrying; no further calls should be made
    QuotaExhausted {
        /// Error message from the vendor
        error: String,
        /// Attempts used, including the fatal one
        attempts: u32,
    },
}

impl<T> CallOutcome<T> {
    /// Whether the call completed
    pub fn is_completed(&self) -> bool {
        matches!(self, CallOutcome::Completed(_))
    }

    /// Attempts used, whatever the outcome
    pub fn attempts(&self) -> u32 {
        match self {
            CallOutcome::Completed(c) => c.attempts,
            CallOutcome::Failed { attempts, .. } | CallOutcome::QuotaExhausted { attempts, .. } => *attempts,
        }
    }
}

/// Provider wrapper applying retries, backoff and output-mode negotiation
///
/// JSON mode is requested first. When the provider answers
/// [`ChatOutcome::UnsupportedMode`], the same attempt is repeated in plain
/// mode and the client stays in plain mode for its remaining lifetime.
#[derive(Debug)]
pub struct ModelClient<P> {
    provider: P,
    policy: RetryPolicy,
    options: RequestOptions,
    json_supported: AtomicBool,
}

impl<P: ChatProvider> ModelClient<P> {
    /// Wrap `provider`
    pub fn new(provider: P, policy: RetryPolicy, options: RequestOptions) -> Self {
        Self {
            provider,
            policy,
            options,
            json_supported: AtomicBool::new(true),
        }
    }

    /// Underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether the next call will ask for native JSON output
    pub fn json_mode_active(&self) -> bool {
        self.options.prefer_json && self.json_supported.load(Ordering::Relaxed)
    }

    /// Call the model and return the raw reply text
    pub async fn call(&self, prompt: &str) -> CallOutcome<String> {
        self.call_with(prompt, |reply| Ok::<_, Infallible>(reply.content.clone()))
            .await
    }

    /// Call the model, converting each reply with `accept`
    ///
    /// Empty replies and `accept` errors are retryable, like transport
    /// failures. Failures matching the policy's fatal predicate end the call
    /// immediately with [`CallOutcome::QuotaExhausted`].
    pub async fn call_with<T, E, F>(&self, prompt: &str, mut accept: F) -> CallOutcome<T>
    where
        F: FnMut(&ChatReply) -> Result<T, E>,
        E: fmt::Display,
    {
        let max_attempts = self.policy.attempts();
        let mut last_error = String::from("no attempt made");
        let mut last_raw = None;

        for attempt_index in 0..max_attempts {
            let attempt = attempt_index + 1;
            let max_tokens = self.options.token_budget.for_attempt(attempt_index);

            let failure = match self.request_once(prompt, max_tokens).await {
                Ok((reply, json_mode)) => {
                    if reply.content.trim().is_empty() {
                        match reply.finish_reason.as_deref() {
                            Some(reason) => format!("Empty response content (finish_reason={})", reason),
                            None => "Empty response content".to_string(),
                        }
                    } else {
                        match accept(&reply) {
                            Ok(value) => {
                                debug!(
                                    provider = self.provider.name(),
                                    attempt,
                                    json_mode,
                                    "Model call accepted"
                                );
                                return CallOutcome::Completed(Completion {
                                    value,
                                    raw: reply.content,
                                    usage: reply.usage,
                                    attempts: attempt,
                                    finish_reason: reply.finish_reason,
                                    max_tokens,
                                    json_mode,
                                });
                            }
                            Err(e) => {
                                let message = if reply.truncated() {
                                    format!("{} (output truncated at max_tokens={:?})", e, max_tokens)
                                } else {
                                    e.to_string()
                                };
                                last_raw = Some(reply.content);
                                message
                            }
                        }
                    }
                }
                Err(failure) => {
                    if self.policy.is_fatal(&failure) {
                        error!(
                            provider = self.provider.name(),
                            attempt,
                            error = %failure,
                            "Fatal provider failure, stopping"
                        );
                        return CallOutcome::QuotaExhausted {
                            error: failure.to_string(),
                            attempts: attempt,
                        };
                    }
                    failure.to_string()
                }
            };

            warn!(
                provider = self.provider.name(),
                attempt,
                max_attempts,
                error = %failure,
                "Model call attempt failed"
            );
            last_error = failure;

            if attempt < max_attempts {
                let delay = self.policy.delay_before_retry(attempt_index);
                debug!(delay_secs = delay.as_secs_f64(), "Backing off before retry");
                tokio::time::sleep(delay).await;
            }
        }

        CallOutcome::Failed {
            error: last_error,
            attempts: max_attempts,
            last_raw,
        }
    }

    /// One attempt: JSON mode if still supported, plain mode otherwise or on rejection
    async fn request_once(
        &self,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<(ChatReply, bool), ProviderFailure> {
        let mut request = ChatRequest::new(prompt)
            .with_temperature(self.options.temperature)
            .with_max_tokens(max_tokens);
        if let Some(system) = &self.options.system_prompt {
            request = request.with_system(system.clone());
        }

        let mut rejection = None;
        if self.json_mode_active() {
            let json_request = request.clone().with_json_mode(true);
            match self.provider.complete(&json_request).await {
                ChatOutcome::Reply(reply) => return Ok((reply, true)),
                ChatOutcome::Error(failure) => return Err(failure),
                ChatOutcome::UnsupportedMode(detail) => {
                    debug!(
                        provider = self.provider.name(),
                        detail = %detail,
                        "JSON mode rejected, retrying in plain mode"
                    );
                    rejection = Some(detail);
                }
            }
        }

        match self.provider.complete(&request).await {
            ChatOutcome::Reply(reply) => {
                // Only a rejection naming response_format that plain mode then
                // answered turns JSON mode off for later calls
                if let Some(detail) = rejection.filter(|d| names_response_format(d)) {
                    self.json_supported.store(false, Ordering::Relaxed);
                    info!(
                        provider = self.provider.name(),
                        detail = %detail,
                        "JSON mode unsupported, switching to plain mode for the rest of the run"
                    );
                }
                Ok((reply, false))
            }
            ChatOutcome::Error(failure) => Err(failure),
            ChatOutcome::UnsupportedMode(detail) => Err(ProviderFailure::transport(format!(
                "Plain mode rejected: {}",
                detail
            ))),
        }
    }
}

fn names_response_format(detail: &str) -> bool {
    detail.to_lowercase().contains("response_format")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::no_backoff;
    use crate::MockProvider;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3).with_backoff(no_backoff)
    }

    fn http_error(status: u16, message: &str) -> ChatOutcome {
        ChatOutcome::Error(ProviderFailure::http(status, message))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let provider = MockProvider::new("{\"a\":1}");
        let options = RequestOptions {
            system_prompt: Some("sys".to_string()),
            temperature: Some(0.0),
            ..RequestOptions::default()
        };
        let client = ModelClient::new(provider.clone(), fast_policy(), options);

        match client.call("prompt").await {
            CallOutcome::Completed(c) => {
                assert_eq!(c.value, "{\"a\":1}");
                assert_eq!(c.attempts, 1);
                assert!(c.json_mode);
            }
            other => panic!("expected completion, got {:?}", other),
        }

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].system.as_deref(), Some("sys"));
        assert_eq!(requests[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_json_mode_fallback_is_sticky() {
        let provider = MockProvider::new("plain reply").rejecting_json_mode();
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let first = client.call("p1").await;
        assert!(matches!(&first, CallOutcome::Completed(c) if !c.json_mode && c.attempts == 1));
        assert_eq!(provider.call_count(), 2);
        assert!(!client.json_mode_active());

        client.call("p2").await;
        assert_eq!(provider.call_count(), 3);
        assert!(!provider.requests()[2].json_mode);
    }

    #[tokio::test]
    async fn test_failed_plain_retry_keeps_json_mode() {
        let provider = MockProvider::new("{}");
        provider.push_outcome(ChatOutcome::UnsupportedMode(
            "response_format is unavailable".to_string(),
        ));
        provider.push_outcome(http_error(400, "maximum context length exceeded"));
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let outcome = client.call("p").await;
        assert!(matches!(&outcome, CallOutcome::Completed(c) if c.json_mode && c.attempts == 2));
        assert!(client.json_mode_active());

        let modes: Vec<_> = provider.requests().iter().map(|r| r.json_mode).collect();
        assert_eq!(modes, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_rejection_without_response_format_is_per_attempt() {
        let provider = MockProvider::new("{}");
        provider.push_outcome(ChatOutcome::UnsupportedMode("unsupported parameter".to_string()));
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let first = client.call("p1").await;
        assert!(matches!(&first, CallOutcome::Completed(c) if !c.json_mode && c.attempts == 1));
        assert!(client.json_mode_active());

        client.call("p2").await;
        assert!(provider.requests()[2].json_mode);
    }

    #[tokio::test]
    async fn test_prefer_json_disabled_sends_plain() {
        let provider = MockProvider::new("x");
        let options = RequestOptions {
            prefer_json: false,
            ..RequestOptions::default()
        };
        let client = ModelClient::new(provider.clone(), fast_policy(), options);
        client.call("p").await;
        assert!(!provider.requests()[0].json_mode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let provider = MockProvider::new("ok");
        provider.push_outcome(http_error(503, "busy"));
        provider.push_outcome(http_error(500, "boom"));
        let client = ModelClient::new(provider.clone(), RetryPolicy::new(3), RequestOptions::default());

        let start = tokio::time::Instant::now();
        let outcome = client.call("p").await;
        let elapsed = start.elapsed();

        assert_eq!(outcome.attempts(), 3);
        assert!(outcome.is_completed());
        assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sleep_after_final_attempt() {
        let provider = MockProvider::new("unused");
        for _ in 0..2 {
            provider.push_outcome(http_error(503, "busy"));
        }
        let client = ModelClient::new(provider, RetryPolicy::new(2), RequestOptions::default());

        let start = tokio::time::Instant::now();
        let outcome = client.call("p").await;
        assert!(matches!(outcome, CallOutcome::Failed { attempts: 2, .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_quota_exhaustion_stops_immediately() {
        let provider = MockProvider::new("never");
        provider.push_outcome(http_error(402, "Insufficient Balance"));
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let outcome = client.call("p").await;
        match outcome {
            CallOutcome::QuotaExhausted { error, attempts } => {
                assert_eq!(attempts, 1);
                assert!(error.contains("402"));
            }
            other => panic!("expected quota exhaustion, got {:?}", other),
        }
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_quota_on_later_attempt() {
        let provider = MockProvider::new("never");
        provider.push_outcome(http_error(500, "boom"));
        provider.push_outcome(http_error(400, "insufficient_quota"));
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let outcome = client.call("p").await;
        assert!(matches!(outcome, CallOutcome::QuotaExhausted { attempts: 2, .. }));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_replies_exhaust_attempts() {
        let provider = MockProvider::new("I cannot comply");
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let outcome = client
            .call_with("p", |reply| {
                if reply.content.starts_with('{') {
                    Ok(())
                } else {
                    Err("not json")
                }
            })
            .await;

        match outcome {
            CallOutcome::Failed { error, attempts, last_raw } => {
                assert_eq!(error, "not json");
                assert_eq!(attempts, 3);
                assert_eq!(last_raw.as_deref(), Some("I cannot comply"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_reply_is_retried() {
        let provider = MockProvider::new("{}");
        provider.push_outcome(ChatOutcome::Reply(ChatReply::text("   ")));
        let client = ModelClient::new(provider.clone(), fast_policy(), RequestOptions::default());

        let outcome = client.call("p").await;
        assert!(matches!(outcome, CallOutcome::Completed(c) if c.attempts == 2 && c.value == "{}"));
    }

    #[tokio::test]
    async fn test_token_budget_doubles_per_attempt() {
        let provider = MockProvider::new("done");
        provider.push_outcome(http_error(500, "a"));
        provider.push_outcome(http_error(500, "b"));
        let options = RequestOptions {
            token_budget: TokenBudget::Doubling { base: 2048, cap: 8192 },
            ..RequestOptions::default()
        };
        let client = ModelClient::new(provider.clone(), fast_policy(), options);

        let outcome = client.call("p").await;
        assert!(matches!(&outcome, CallOutcome::Completed(c) if c.max_tokens == Some(8192)));

        let caps: Vec<_> = provider.requests().iter().map(|r| r.max_tokens).collect();
        assert_eq!(caps, vec![Some(2048), Some(4096), Some(8192)]);
    }

    #[test]
    fn test_token_budget_caps() {
        let budget = TokenBudget::Doubling { base: 1000, cap: 3000 };
        assert_eq!(budget.for_attempt(0), Some(1000));
        assert_eq!(budget.for_attempt(1), Some(2000));
        assert_eq!(budget.for_attempt(2), Some(3000));
        assert_eq!(budget.for_attempt(40), Some(3000));
        assert_eq!(TokenBudget::Unset.for_attempt(3), None);
    }
}
