//! Error types for the ContextMesh domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own enum: ingestion faults abort a run,
//! provider faults are turned into result text by the coordinator.

use std::path::PathBuf;
use thiserror::Error;

// --- Bounded context errors ---

/// Faults that abort a whole ingestion run.
///
/// Per-file problems (binary, unreadable, undecodable) never show up here;
/// they are skipped by the builder.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    #[error("Cannot traverse {path}: {reason}")]
    RootInaccessible { path: PathBuf, reason: String },

    #[error("Ingestion root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Ingestion cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
