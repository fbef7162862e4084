//! Business logic and seam trait definitions for Shelver.
//!
//! This crate defines the "ports" (completion client, entity store, batch
//! store, callback sender) that the infrastructure layer implements, and the
//! pure machinery between them: token budgeting, progressive-tax allocation,
//! fuzzy name reconciliation, prompt construction, plan sanitization, and the
//! batch state machine. It depends only on `shelver-types` -- never on
//! `shelver-infra` or any database/IO crate.

pub mod batch;
pub mod budget;
pub mod context;
pub mod llm;
pub mod organize;
pub mod prompt;
pub mod publish;
pub mod reconcile;
pub mod store;
