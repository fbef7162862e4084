//! Entity store trait definition.
//!
//! The entity store is an external content-addressed service with
//! compare-and-swap versioning. This is the port; the REST client lives in
//! shelver-infra.

use shelver_types::entity::{AppendVersionRequest, CreateEntityRequest, Entity};
use shelver_types::error::StoreError;

/// Operations against the content-addressed entity store.
///
/// Native async fn in traits (RPITIT, Rust 2024 edition); services stay
/// generic over the store and get pinned to the concrete client in AppState.
pub trait EntityStore: Send + Sync {
    /// Fetch an entity's manifest by id.
    fn get_entity(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Entity, StoreError>> + Send;

    /// Fetch raw bytes by content address.
    fn cat(
        &self,
        cid: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Upload bytes; returns the content address.
    fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<String, StoreError>> + Send;

    /// Create a new entity with the given components and parent.
    fn create_entity(
        &self,
        request: &CreateEntityRequest,
    ) -> impl std::future::Future<Output = Result<Entity, StoreError>> + Send;

    /// Append a version to an entity's chain.
    ///
    /// Fails with [`StoreError::CasConflict`] when `expect_tip` is stale;
    /// callers must refetch the current tip before retrying.
    fn append_version(
        &self,
        id: &str,
        request: &AppendVersionRequest,
    ) -> impl std::future::Future<Output = Result<Entity, StoreError>> + Send;
}
