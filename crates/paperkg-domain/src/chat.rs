//! Vendor-neutral request and outcome types for one chat-completion call

use crate::usage::TokenUsage;
use std::fmt;

/// Error-text fragments that identify an exhausted account balance or quota
const QUOTA_PATTERNS: &[&str] = &[
    "insufficient balance",
    "insufficient_balance",
    "insufficient_quota",
];

/// One chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Optional system message sent before the prompt
    pub system: Option<String>,

    /// Filled prompt text (sent as the user message)
    pub prompt: String,

    /// Ask the vendor for native JSON output (`response_format`)
    pub json_mode: bool,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Completion token cap
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a plain request for the given prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            json_mode: false,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the system message
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request native JSON output
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token cap
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A successful completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Raw text content of the first choice
    pub content: String,

    /// Token usage, if the vendor reported it
    pub usage: Option<TokenUsage>,

    /// Why generation stopped (`stop`, `length`, ...), if reported
    pub finish_reason: Option<String>,
}

impl ChatReply {
    /// Create a reply with no usage or finish reason
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            finish_reason: None,
        }
    }

    /// Whether the vendor cut the output at the token cap
    pub fn truncated(&self) -> bool {
        self.finish_reason
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case("length"))
            .unwrap_or(false)
    }
}

/// A failed call as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// HTTP status, when the failure came from an HTTP response
    pub status: Option<u16>,

    /// Human-readable detail (response body or transport error)
    pub message: String,
}

impl ProviderFailure {
    /// Failure carrying an HTTP status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Failure without a status (network, decoding, ...)
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Whether this failure means the account balance or quota is used up
    ///
    /// # Examples
    ///
    /// ```
    /// use paperkg_domain::ProviderFailure;
    ///
    /// assert!(ProviderFailure::http(402, "payment required").is_quota_exhausted());
    /// assert!(ProviderFailure::http(400, "Insufficient Balance").is_quota_exhausted());
    /// assert!(!ProviderFailure::http(503, "overloaded").is_quota_exhausted());
    /// ```
    pub fn is_quota_exhausted(&self) -> bool {
        if self.status == Some(402) {
            return true;
        }
        let lower = self.message.to_lowercase();
        QUOTA_PATTERNS.iter().any(|p| lower.contains(p))
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of one low-level provider call
///
/// Rejection of the JSON request mode is a distinct variant so callers can
/// fall back to plain mode without inspecting error text themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// The vendor produced a completion
    Reply(ChatReply),

    /// The vendor rejected the requested output mode; detail attached
    UnsupportedMode(String),

    /// Any other failure
    Error(ProviderFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = ChatRequest::new("hello")
            .with_system("sys")
            .with_json_mode(true)
            .with_temperature(Some(0.0))
            .with_max_tokens(Some(2048));
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.system.as_deref(), Some("sys"));
        assert!(req.json_mode);
        assert_eq!(req.max_tokens, Some(2048));
    }

    #[test]
    fn test_quota_detection_by_text() {
        let failure = ProviderFailure::transport("Error code: insufficient_quota for this key");
        assert!(failure.is_quota_exhausted());
    }

    #[test]
    fn test_rate_limit_is_not_quota() {
        let failure = ProviderFailure::http(429, "Too Many Requests");
        assert!(!failure.is_quota_exhausted());
    }

    #[test]
    fn test_truncated_reply() {
        let mut reply = ChatReply::text("{");
        assert!(!reply.truncated());
        reply.finish_reason = Some("LENGTH".to_string());
        assert!(reply.truncated());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(ProviderFailure::http(500, "boom").to_string(), "HTTP 500: boom");
        assert_eq!(ProviderFailure::transport("reset").to_string(), "reset");
    }
}
