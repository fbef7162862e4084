//! Infrastructure implementations for Shelver.
//!
//! Concrete adapters behind the shelver-core seams: the reqwest
//! OpenAI-compatible LLM client, the entity-store REST client, the callback
//! sender, SQLite batch persistence, and configuration loading.

pub mod callback;
pub mod config;
pub mod llm;
pub mod sqlite;
pub mod store;
