//! paperkg LLM Provider Layer
//!
//! Chat-completion providers and the shared call policy used by every vendor.
//!
//! # Architecture
//!
//! Providers implement the `ChatProvider` trait from `paperkg-domain` and
//! perform exactly one HTTP request per call. [`ModelClient`] wraps any
//! provider with the uniform policy: native JSON mode with a plain-text
//! fallback, bounded retries with exponential backoff, and a circuit breaker
//! for exhausted account balances.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic scripted provider for testing
//! - `OpenAiCompatProvider`: OpenAI-compatible `/chat/completions` endpoints
//!   (DeepSeek, Gemini gateway, Kimi/Moonshot)
//!
//! # Examples
//!
//! ```
//! use paperkg_llm::{MockProvider, ModelClient, RequestOptions, RetryPolicy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = ModelClient::new(
//!     MockProvider::new(r#"{"entities":[],"relations":[]}"#),
//!     RetryPolicy::default(),
//!     RequestOptions::default(),
//! );
//! let outcome = client.call("extract this").await;
//! assert!(outcome.is_completed());
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod openai_compat;
pub mod retry;
pub mod vendor;

use paperkg_domain::traits::ChatProvider;
use paperkg_domain::{ChatOutcome, ChatReply, ChatRequest, ProviderFailure};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use client::{CallOutcome, Completion, ModelClient, RequestOptions, TokenBudget};
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{exponential_backoff, RetryPolicy};
pub use vendor::Vendor;

/// Errors that can occur while configuring or probing a provider
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the vendor
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The vendor rejected the credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Missing API key, bad base URL, or HTTP client setup failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown vendor name
    #[error("Unknown vendor: {0}")]
    UnknownVendor(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Communication(e.to_string())
    }
}

/// Mock chat provider for deterministic testing
///
/// Returns pre-configured outcomes without making any network calls.
/// Scripted outcomes (queued with [`MockProvider::push_outcome`]) are consumed
/// first, in order; afterwards a prompt is matched against registered
/// fragments, falling back to the default response.
///
/// # Examples
///
/// ```
/// use paperkg_llm::MockProvider;
/// use paperkg_domain::{ChatOutcome, ChatRequest, ProviderFailure};
/// use paperkg_domain::traits::ChatProvider;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut provider = MockProvider::new("default");
/// provider.add_response("paper b", "I cannot comply");
/// provider.push_outcome(ChatOutcome::Error(ProviderFailure::http(503, "busy")));
///
/// // The scripted failure comes first
/// let first = provider.complete(&ChatRequest::new("paper a")).await;
/// assert!(matches!(first, ChatOutcome::Error(_)));
///
/// let second = provider.complete(&ChatRequest::new("text of paper b")).await;
/// assert!(matches!(second, ChatOutcome::Reply(r) if r.content == "I cannot comply"));
/// assert_eq!(provider.call_count(), 2);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    model: String,
    reject_json_mode: bool,
    responses: Arc<Mutex<HashMap<String, ChatOutcome>>>,
    script: Arc<Mutex<VecDeque<ChatOutcome>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            model: "mock-model".to_string(),
            reject_json_mode: false,
            responses: Arc::new(Mutex::new(HashMap::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply with `response` whenever the prompt contains `fragment`
    pub fn add_response(&mut self, fragment: impl Into<String>, response: impl Into<String>) {
        self.lock_responses()
            .insert(fragment.into(), ChatOutcome::Reply(ChatReply::text(response)));
    }

    /// Fail with `failure` whenever the prompt contains `fragment`
    pub fn add_failure(&mut self, fragment: impl Into<String>, failure: ProviderFailure) {
        self.lock_responses()
            .insert(fragment.into(), ChatOutcome::Error(failure));
    }

    /// Queue an outcome returned by the next call, ahead of any matching
    pub fn push_outcome(&self, outcome: ChatOutcome) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    /// Answer every JSON-mode request with `UnsupportedMode`
    pub fn rejecting_json_mode(mut self) -> Self {
        self.reject_json_mode = true;
        self
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock_requests().clone()
    }

    /// Reset the recorded requests
    pub fn reset_call_count(&self) {
        self.lock_requests().clear();
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, HashMap<String, ChatOutcome>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<ChatRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn respond(&self, request: &ChatRequest) -> ChatOutcome {
        self.lock_requests().push(request.clone());

        if request.json_mode && self.reject_json_mode {
            return ChatOutcome::UnsupportedMode(
                "response_format is not supported by this model".to_string(),
            );
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(outcome) = scripted {
            return outcome;
        }

        let responses = self.lock_responses();
        // Longest fragment wins so overlapping fragments stay deterministic
        let matched = responses
            .iter()
            .filter(|(fragment, _)| request.prompt.contains(fragment.as_str()))
            .max_by_key(|(fragment, _)| fragment.len())
            .map(|(_, outcome)| outcome.clone());

        matched.unwrap_or_else(|| ChatOutcome::Reply(ChatReply::text(self.default_response.clone())))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> ChatOutcome {
        self.respond(request)
    }
}
