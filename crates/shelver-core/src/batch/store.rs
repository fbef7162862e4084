//! Batch state persistence trait.

use shelver_types::batch::BatchState;
use shelver_types::error::BatchError;

/// Durable storage for [`BatchState`], keyed by (batch_id, chunk_id).
///
/// The owning runner is the only writer for a given key; the status endpoint
/// and submit entry point only read. Implementations live in shelver-infra
/// (SQLite); tests use an in-memory map.
pub trait BatchStore: Send + Sync {
    /// Insert or replace the state for its (batch_id, chunk_id).
    fn put(
        &self,
        state: &BatchState,
    ) -> impl std::future::Future<Output = Result<(), BatchError>> + Send;

    fn get(
        &self,
        batch_id: &str,
        chunk_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<BatchState>, BatchError>> + Send;

    fn delete(
        &self,
        batch_id: &str,
        chunk_id: &str,
    ) -> impl std::future::Future<Output = Result<(), BatchError>> + Send;

    /// All batches not yet in a terminal phase, for crash recovery at startup.
    fn list_active(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<BatchState>, BatchError>> + Send;
}
