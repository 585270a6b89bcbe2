//! Error types for the Extractor

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// No prompt template resolved for the document
    #[error("No prompt template found for {document}")]
    PromptNotFound {
        /// Category-relative document path
        document: String,
    },

    /// The model returned nothing but whitespace
    #[error("Model returned empty content")]
    EmptyContent,

    /// Model output could not be turned into JSON
    #[error("Unparseable model output ({length} chars): {preview}")]
    Parse {
        /// Length of the raw output in characters
        length: usize,
        /// Leading part of the raw output
        preview: String,
    },

    /// Filesystem error with the offending path
    #[error("I/O error on {path}: {source}")]
    File {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error without path context
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    /// Attach a path to an I/O error
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractorError::File {
            path: path.into(),
            source,
        }
    }
}
