//! LLM provider adapters.

pub mod openai_compat;
pub mod pricing;

pub use openai_compat::OpenAiCompatClient;
