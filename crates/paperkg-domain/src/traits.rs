//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::chat::{ChatOutcome, ChatRequest};
use std::future::Future;

/// Trait for chat-completion providers
///
/// Implemented by the infrastructure layer (paperkg-llm). A provider performs
/// exactly one request per call; retries, backoff and output-mode fallback
/// are the caller's concern.
pub trait ChatProvider {
    /// Short vendor name used in logs (e.g. `deepseek`)
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// Perform one chat-completion request
    fn complete(&self, request: &ChatRequest) -> impl Future<Output = ChatOutcome> + Send;
}
