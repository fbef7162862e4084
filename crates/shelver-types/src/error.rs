//! Error types shared across the Shelver crates.

use thiserror::Error;

/// Errors from the synchronous organize path.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("request too large: {actual} bytes exceeds {limit} bytes")]
    TooLarge { actual: usize, limit: usize },

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),

    /// The provider returned 2xx but the content was not the JSON we asked for.
    #[error("bad model response: {0}")]
    BadResponse(String),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
}

/// Fatal structural problems in a model response.
///
/// Recoverable problems (hallucinated names, omissions, directory paths)
/// never surface here; they become warnings during sanitization.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("group name '{0}' contains filesystem-unsafe characters")]
    UnsafeGroupName(String),

    #[error("group '{0}' has no files")]
    EmptyGroup(String),
}

/// Errors from entity-store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(String),

    /// The expected tip was stale. Refetch the current tip before retrying.
    #[error("compare-and-swap conflict on {0}")]
    CasConflict(String),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("permanent store error: {0}")]
    Permanent(String),
}

impl StoreError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::CasConflict(_) | StoreError::Transient(_))
    }
}

/// Errors from batch state persistence.
///
/// A duplicate submit is not an error: it answers `already_processing`
/// through the normal receipt.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch state persistence failed: {0}")]
    Persistence(String),
}

/// Callback delivery failures.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback delivery failed: {0}")]
    Delivery(String),

    #[error("orchestrator answered {0}")]
    Status(u16),
}
