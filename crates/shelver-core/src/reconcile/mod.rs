//! Reconciling model output with the authoritative input set.
//!
//! The model returns filenames as strings; nothing guarantees they match the
//! inputs byte-for-byte. The matcher resolves near-miss names, the sanitizer
//! applies it across a whole response and repairs structural damage
//! (directory paths, hallucinated names, omissions) into warnings.

pub mod matcher;
pub mod sanitizer;

pub use matcher::{MatchConfidence, NameMatcher};
pub use sanitizer::{sanitize, SanitizeOutcome};
