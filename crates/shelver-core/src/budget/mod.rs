//! Token budgeting: estimation, truncation, and fair-share allocation.

pub mod allocator;
pub mod estimator;

pub use allocator::{allocate, Allocation, TokenWeight};
pub use estimator::{estimate_tokens, truncate_to_budget, TRUNCATION_MARKER};
