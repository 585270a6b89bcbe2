//! OpenAI-compatible Provider Implementation
//!
//! Talks to any `/chat/completions` endpoint that follows the OpenAI wire
//! format. DeepSeek, the hiapi.online Gemini gateway and Kimi/Moonshot are
//! all reached through this one provider, configured per [`Vendor`].
//!
//! # Features
//!
//! - Async HTTP communication with bearer authentication
//! - Native JSON mode (`response_format`) with rejection detection
//! - Token usage normalized into the vendor-neutral [`TokenUsage`]
//! - `/models` preflight for catching bad keys or base URLs early
//!
//! # Examples
//!
//! ```no_run
//! use paperkg_llm::{OpenAiCompatProvider, Vendor};
//!
//! let provider = OpenAiCompatProvider::for_vendor(Vendor::Kimi, "sk-xxxx").unwrap();
//! assert_eq!(provider.endpoint(), "https://api.moonshot.cn/v1");
//! ```

use crate::vendor::Vendor;
use crate::LlmError;
use paperkg_domain::traits::ChatProvider;
use paperkg_domain::{ChatOutcome, ChatReply, ChatRequest, ProviderFailure, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout for one chat-completion request (5 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Markers used when no vendor preset applies
const DEFAULT_UNSUPPORTED_MARKERS: &[&str] = &["response_format", "unsupported"];

/// Provider for OpenAI-compatible chat-completion APIs
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
    unsupported_markers: Vec<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Request body for the chat-completions API
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

/// Response from the chat-completions API
#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Usage block as reported by the vendor; any field may be missing
#[derive(Deserialize, Default)]
struct UsageBody {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Normalize a vendor usage block
///
/// Returns `None` when the vendor reported nothing at all.
fn token_usage(body: Option<&UsageBody>) -> Option<TokenUsage> {
    let body = body?;
    if body.prompt_tokens.is_none() && body.completion_tokens.is_none() && body.total_tokens.is_none() {
        return None;
    }
    Some(TokenUsage::new(
        body.prompt_tokens.unwrap_or(0),
        body.completion_tokens.unwrap_or(0),
        body.total_tokens,
    ))
}

impl OpenAiCompatProvider {
    /// Create a provider for an arbitrary OpenAI-compatible endpoint
    ///
    /// # Parameters
    ///
    /// - `name`: Short name used in logs
    /// - `endpoint`: Base URL, without `/chat/completions`
    /// - `model`: Model identifier
    /// - `api_key`: Bearer token
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            unsupported_markers: DEFAULT_UNSUPPORTED_MARKERS.iter().map(|m| m.to_string()).collect(),
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
        })
    }

    /// Create a provider with a vendor's default endpoint, model and markers
    pub fn for_vendor(vendor: Vendor, api_key: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self::new(
            vendor.as_str(),
            vendor.default_base_url(),
            vendor.default_model(),
            api_key,
        )?
        .with_unsupported_markers(vendor.unsupported_mode_markers()))
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the base URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Replace the error-text fragments that mean "JSON mode not supported"
    pub fn with_unsupported_markers(mut self, markers: &[&str]) -> Self {
        self.unsupported_markers = markers.iter().map(|m| m.to_lowercase()).collect();
        self
    }

    /// Base URL in use
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Probe `GET /models` to validate the key and base URL
    ///
    /// Returns the number of models listed.
    ///
    /// # Errors
    ///
    /// - [`LlmError::Unauthorized`] on HTTP 401/403
    /// - [`LlmError::Communication`] for any other failure, which callers
    ///   usually downgrade to a warning
    pub async fn preflight(&self) -> Result<usize, LlmError> {
        let response = self
            .client
            .get(format!("{}/models", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Unauthorized(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Communication(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse model list: {}", e)))?;
        Ok(list.data.len())
    }

    fn is_unsupported_mode(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        self.unsupported_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    async fn send(&self, request: &ChatRequest) -> ChatOutcome {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = match self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ChatOutcome::Error(ProviderFailure::transport(format!("Request failed: {}", e))),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let failure = ProviderFailure::http(status.as_u16(), error_text);
            if request.json_mode && !failure.is_quota_exhausted() && self.is_unsupported_mode(&failure.message) {
                return ChatOutcome::UnsupportedMode(failure.message);
            }
            return ChatOutcome::Error(failure);
        }

        let parsed: ChatCompletionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return ChatOutcome::Error(ProviderFailure::transport(format!(
                    "Failed to parse response: {}",
                    e
                )))
            }
        };

        let usage = token_usage(parsed.usage.as_ref());
        let (content, finish_reason) = match parsed.choices.into_iter().next() {
            Some(choice) => (
                choice.message.and_then(|m| m.content).unwrap_or_default(),
                choice.finish_reason,
            ),
            None => (String::new(), None),
        };

        ChatOutcome::Reply(ChatReply {
            content,
            usage,
            finish_reason,
        })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))
}

impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> ChatOutcome {
        self.send(request).await
    }
}
