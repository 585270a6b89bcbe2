//! paperkg Domain Layer
//!
//! Core value objects and trait interfaces for the paper-to-knowledge-graph
//! extraction pipeline. Apart from `uuid` this crate has no external
//! dependencies; HTTP, JSON and filesystem concerns live in the other crates.
//!
//! ## Key Concepts
//!
//! - **Document**: one paper, identified by its filename stem
//! - **Category**: `priority` papers are extracted before `general` ones
//! - **ChatRequest / ChatOutcome**: the vendor-neutral shape of one model call
//! - **TokenUsage**: prompt/completion/total token counts, when a vendor reports them
//! - **RunId**: timestamp-derived identity of one extraction run

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod document;
pub mod run;
pub mod traits;
pub mod usage;

// Re-exports for convenience
pub use chat::{ChatOutcome, ChatReply, ChatRequest, ProviderFailure};
pub use document::{Category, Document, DocumentSource};
pub use run::RunId;
pub use traits::ChatProvider;
pub use usage::TokenUsage;
