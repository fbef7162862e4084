//! Shared domain types for Shelver.
//!
//! This crate contains the core domain types used across the Shelver
//! organization service: file inputs, grouping plans, batch lifecycle state,
//! entity-store shapes, LLM request/response types, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod batch;
pub mod config;
pub mod entity;
pub mod error;
pub mod llm;
pub mod organize;
