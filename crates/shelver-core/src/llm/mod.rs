//! LLM client seam.

pub mod client;
pub mod retry;

pub use client::CompletionClient;
pub use retry::{backoff_delay, complete_with_retry};
