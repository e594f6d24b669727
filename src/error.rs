//! Error types for the semantic search service
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use crate::vector::VectorError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for index builds and queries
#[derive(Error, Debug)]
pub enum SearchError {
    /// A document could not be read during the index build
    #[error("Failed to read document '{path}': {source}")]
    CorpusRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Empty, oversized, or degenerate query
    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// Requested document or asset does not exist
    #[error("Not found: '{path}'")]
    NotFound { path: String },

    /// Requested path resolves outside its root directory
    #[error("Path '{path}' escapes the content root")]
    PathTraversal { path: String },

    /// The embedding model failed
    #[error("Embedding failed: {0}")]
    EmbedderFailure(#[from] VectorError),

    /// The index build has not finished yet
    #[error("Index is still being built")]
    NotReady,

    /// Request exceeded the configured time budget
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Invariant violations, e.g. a worker task panicked
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::CorpusRead { .. } => "CORPUS_READ_ERROR",
            Self::InvalidQuery { .. } => "INVALID_QUERY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::PathTraversal { .. } => "PATH_TRAVERSAL",
            Self::EmbedderFailure(_) => "EMBEDDER_FAILURE",
            Self::NotReady => "NOT_READY",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuery { .. } | Self::NotFound { .. } | Self::PathTraversal { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::CorpusRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Documents must be valid UTF-8 text",
            ],
            Self::InvalidQuery { .. } => vec![
                "Pass a non-empty query, e.g. /search?query=getting+started",
            ],
            Self::EmbedderFailure(_) => vec![
                "Check that the embedding model downloaded completely",
                "Delete the model cache directory to force a fresh download",
            ],
            Self::Timeout { .. } => vec![
                "Increase server.request_timeout_ms",
                "Shorten the query text",
            ],
            Self::NotReady => vec!["Retry once GET /ready returns 200"],
            Self::Config { .. } => vec!["Run 'ragrepo config' to inspect the effective settings"],
            _ => vec![],
        }
    }
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;
