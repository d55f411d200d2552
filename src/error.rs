//! Error types for the store providers and the registry builder.
//!
//! Parse anomalies never surface as errors and validation findings are
//! returned as a report, so only storage-facing operations have error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for store provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by store providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(String),

    /// The category code is not part of the registry's category set.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// The backing storage failed; passed through unchanged.
    #[error("storage I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The backing file could not be (de)serialized.
    #[error("registry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Whether the caller can fix the request (bad id or category)
    /// as opposed to a storage fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnknownCategory(_))
    }
}

/// Errors raised while building a registry from a document directory.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read document directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read document {path}: {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
