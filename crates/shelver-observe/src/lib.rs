//! Observability setup for Shelver.

pub mod tracing_setup;
