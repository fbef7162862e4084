//! LLM request/response types.
//!
//! One operation: send a system+user prompt pair with a JSON-schema response
//! format, get back the content and usage. Streaming is deliberately absent;
//! the organize path always needs the complete plan before it can act.

use serde::{Deserialize, Serialize};

/// A completion request against an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// JSON schema the response body must conform to.
    pub schema: serde_json::Value,
    /// Name reported to the provider for the schema.
    pub schema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub max_tokens: u32,
}

/// The provider's answer plus usage accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Estimated cost in USD, derived from configured per-million prices.
    pub cost: f64,
    pub model: String,
}

/// Errors from the LLM provider, partitioned by retry policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Rate limit, overload, or network flake. Retried with backoff.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// A 4xx other than 429. Retrying will not help.
    #[error("permanent provider error: {0}")]
    Permanent(String),

    /// The provider answered 2xx but the body carried no choices.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Whether this failure is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}
