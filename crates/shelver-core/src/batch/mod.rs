//! Async batch processing.
//!
//! One batch = one (batch_id, chunk_id) worth of directory ids. A single
//! runner task per batch owns all state and re-enters on a timer to make
//! progress through the phases; across batches there is no shared mutable
//! state at all.

pub mod callback;
pub mod machine;
pub mod store;

pub use callback::{build_callback_payload, CallbackSender};
pub use machine::BatchProcessor;
pub use store::BatchStore;
