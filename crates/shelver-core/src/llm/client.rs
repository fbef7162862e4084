//! CompletionClient trait definition.
//!
//! The one abstraction over the LLM provider. Uses native async fn in traits
//! (RPITIT, Rust 2024 edition); the implementation lives in shelver-infra.

use shelver_types::llm::{Completion, CompletionRequest, LlmError};

/// A client for an OpenAI-compatible chat-completions endpoint.
///
/// One operation: send a system+user pair with a JSON-schema response format
/// and get back content plus usage. The client is trusted to produce
/// parseable JSON (the provider enforces the schema), never to produce
/// semantically correct content.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<Completion, LlmError>> + Send;
}
